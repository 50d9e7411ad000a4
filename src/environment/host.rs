//! Production host signal adapter.
//!
//! # Responsibilities
//! - Own the current `EnvironmentState` and broadcast changes
//! - Accept host events (visibility, battery, network quality)
//! - Optionally refresh the battery level from a sysfs capacity file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::EnvironmentConfig;
use crate::environment::{EnvironmentPatch, EnvironmentSignals, EnvironmentState};

/// Floor for the battery refresh period; `interval` rejects zero.
const MIN_BATTERY_REFRESH: Duration = Duration::from_secs(1);

/// Environment fed by real host events.
#[derive(Debug)]
pub struct HostEnvironment {
    tx: watch::Sender<EnvironmentState>,
}

impl HostEnvironment {
    pub fn new(initial: EnvironmentState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Build from the `[environment]` config section.
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self::new(EnvironmentState {
            visible: config.visible,
            battery_level: config.battery_level.clamp(0.0, 1.0),
            network_quality: config.network_quality,
        })
    }

    /// Apply a host event. Subscribers are woken only if something changed.
    ///
    /// Returns the resulting snapshot.
    pub fn apply(&self, patch: EnvironmentPatch) -> EnvironmentState {
        self.tx.send_if_modified(|state| {
            let next = state.apply(patch);
            if next == *state {
                return false;
            }
            tracing::info!(
                visible = next.visible,
                battery_level = next.battery_level,
                network_quality = ?next.network_quality,
                "Host environment changed"
            );
            *state = next;
            true
        });
        *self.tx.borrow()
    }

    pub fn set_visible(&self, visible: bool) -> EnvironmentState {
        self.apply(EnvironmentPatch {
            visible: Some(visible),
            ..Default::default()
        })
    }

    /// Periodically refresh the battery level from `path` until shutdown.
    pub fn spawn_battery_monitor(
        self: &Arc<Self>,
        path: PathBuf,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let env = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(MIN_BATTERY_REFRESH));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match read_battery_level(&path).await {
                            Ok(level) => {
                                env.apply(EnvironmentPatch {
                                    battery_level: Some(level),
                                    ..Default::default()
                                });
                            }
                            Err(e) => {
                                tracing::warn!(path = %path.display(), error = %e, "Failed to read battery level");
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Battery monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

impl EnvironmentSignals for HostEnvironment {
    fn current(&self) -> EnvironmentState {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<EnvironmentState> {
        self.tx.subscribe()
    }
}

/// Read a capacity file holding a percentage (e.g. "87\n") as a `[0, 1]` level.
pub async fn read_battery_level(path: &Path) -> std::io::Result<f64> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_capacity(&raw).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected capacity value '{}'", raw.trim()),
        )
    })
}

fn parse_capacity(raw: &str) -> Option<f64> {
    let percent: f64 = raw.trim().parse().ok()?;
    if !percent.is_finite() {
        return None;
    }
    Some((percent / 100.0).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::NetworkQuality;

    #[test]
    fn test_parse_capacity() {
        assert_eq!(parse_capacity("87\n"), Some(0.87));
        assert_eq!(parse_capacity("150"), Some(1.0));
        assert_eq!(parse_capacity("full"), None);
    }

    #[tokio::test]
    async fn test_apply_notifies_only_on_change() {
        let env = HostEnvironment::new(EnvironmentState::default());
        let mut rx = env.subscribe();

        env.set_visible(true);
        assert!(!rx.has_changed().unwrap());

        let state = env.set_visible(false);
        assert!(!state.visible);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().visible);
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = EnvironmentConfig {
            visible: false,
            battery_level: 0.1,
            network_quality: NetworkQuality::Fast,
            ..Default::default()
        };
        let env = HostEnvironment::from_config(&config);
        let state = env.current();
        assert!(!state.visible);
        assert_eq!(state.battery_level, 0.1);
        assert_eq!(state.network_quality, NetworkQuality::Fast);
    }

    #[tokio::test]
    async fn test_battery_monitor_survives_zero_period() {
        let path = std::env::temp_dir().join(format!("health-poller-battery-zero-{}", std::process::id()));
        tokio::fs::write(&path, "42\n").await.unwrap();

        let env = Arc::new(HostEnvironment::new(EnvironmentState::default()));
        let mut rx = env.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = env.spawn_battery_monitor(path.clone(), Duration::ZERO, shutdown_rx);

        rx.changed().await.unwrap();
        assert_eq!(env.current().battery_level, 0.42);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_battery_monitor_reads_file() {
        let path = std::env::temp_dir().join(format!("health-poller-battery-{}", std::process::id()));
        tokio::fs::write(&path, "15\n").await.unwrap();

        let env = Arc::new(HostEnvironment::new(EnvironmentState::default()));
        let mut rx = env.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = env.spawn_battery_monitor(path.clone(), Duration::from_secs(60), shutdown_rx);

        rx.changed().await.unwrap();
        assert_eq!(env.current().battery_level, 0.15);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
    }
}
