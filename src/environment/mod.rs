//! Host environment signals.
//!
//! # Data Flow
//! ```text
//! Host events (admin API, battery file, config defaults)
//!     → host.rs (HostEnvironment: watch channel owner)
//!     → EnvironmentSignals::subscribe()
//!     → schedulers re-evaluate cadence on change
//!
//! Tests:
//!     → fixed.rs (StaticEnvironment: deterministic values)
//! ```
//!
//! # Design Decisions
//! - The polling engine only reads snapshots; it never writes back
//! - Snapshots are small `Copy` values, replaced wholesale on each event

pub mod fixed;
pub mod host;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use fixed::StaticEnvironment;
pub use host::HostEnvironment;

/// Coarse network quality reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Fast,
    #[default]
    Normal,
    Slow,
}

/// Read-only snapshot of host conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Whether anyone is looking at the status (foreground).
    pub visible: bool,
    /// Battery level in `[0, 1]`.
    pub battery_level: f64,
    /// Current network quality.
    pub network_quality: NetworkQuality,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            visible: true,
            battery_level: 1.0,
            network_quality: NetworkQuality::Normal,
        }
    }
}

/// Partial update describing a single host event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPatch {
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub network_quality: Option<NetworkQuality>,
}

impl EnvironmentState {
    /// Apply a host event, clamping the battery level into `[0, 1]`.
    pub fn apply(mut self, patch: EnvironmentPatch) -> Self {
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(level) = patch.battery_level {
            self.battery_level = level.clamp(0.0, 1.0);
        }
        if let Some(quality) = patch.network_quality {
            self.network_quality = quality;
        }
        self
    }
}

/// Source of host signals consumed by the schedulers.
pub trait EnvironmentSignals: Send + Sync {
    /// Latest snapshot.
    fn current(&self) -> EnvironmentState;

    /// Receiver notified whenever the snapshot changes.
    fn subscribe(&self) -> watch::Receiver<EnvironmentState>;
}
