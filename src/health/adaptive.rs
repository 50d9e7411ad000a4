//! Adaptive polling cadence and per-call timeout.
//!
//! # Interval
//! ```text
//! circuit Open                  → fixed open-circuit interval
//! hidden, nothing cached yet    → suspended
//! otherwise                     → base(status) × hidden? × low battery?
//! ```
//! Degraded and erroring services are rechecked sooner than healthy ones;
//! confirmed-down services less often.
//!
//! # Timeout
//! ```text
//! base, or min if average latency is fast, or max if it is slow
//!     × network quality factor
//!     → clamp [min, max]
//! ```

use std::time::Duration;

use crate::config::{PollerConfig, PollingConfig, TimeoutConfig};
use crate::environment::{EnvironmentState, NetworkQuality};
use crate::health::types::ServiceStatus;
use crate::resilience::circuit_breaker::CircuitState;

/// Longest delay ever scheduled, whatever the multipliers say.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// When the next poll should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDelay {
    After(Duration),
    /// Do not arm a timer; wait for visibility or a forced poll.
    Suspended,
}

/// Cadence and timeout calculator.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePolicy {
    polling: PollingConfig,
    timeouts: TimeoutConfig,
}

impl AdaptivePolicy {
    pub fn new(polling: PollingConfig, timeouts: TimeoutConfig) -> Self {
        Self { polling, timeouts }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.polling.clone(), config.timeouts.clone())
    }

    pub fn base_interval(&self, status: ServiceStatus) -> Duration {
        let secs = match status {
            ServiceStatus::Up => self.polling.up_secs,
            ServiceStatus::Degraded => self.polling.degraded_secs,
            ServiceStatus::Down => self.polling.down_secs,
            ServiceStatus::Error => self.polling.error_secs,
        };
        Duration::from_secs(secs).min(MAX_INTERVAL)
    }

    /// Delay before the next poll of a service.
    ///
    /// `last` is the status of the latest cached result, if any.
    pub fn adaptive_interval(
        &self,
        last: Option<ServiceStatus>,
        circuit: CircuitState,
        env: &EnvironmentState,
    ) -> PollDelay {
        if circuit == CircuitState::Open {
            let secs = self.polling.open_circuit_secs;
            return PollDelay::After(Duration::from_secs(secs).min(MAX_INTERVAL));
        }

        let Some(status) = last else {
            if !env.visible {
                return PollDelay::Suspended;
            }
            return PollDelay::After(self.base_interval(ServiceStatus::Up));
        };

        let mut secs = self.base_interval(status).as_secs_f64();
        if !env.visible {
            secs *= self.polling.hidden_multiplier;
        }
        if env.battery_level < self.polling.low_battery_threshold {
            secs *= self.polling.low_battery_multiplier;
        }
        PollDelay::After(saturating_interval(secs))
    }

    /// Per-call timeout, always within `[min_ms, max_ms]`.
    pub fn adaptive_timeout(&self, average_latency_ms: Option<f64>, quality: NetworkQuality) -> Duration {
        let t = &self.timeouts;
        let mut timeout_ms = match average_latency_ms {
            Some(avg) if avg < t.fast_latency_ms as f64 => t.min_ms as f64,
            Some(avg) if avg > t.slow_latency_ms as f64 => t.max_ms as f64,
            _ => t.base_ms as f64,
        };

        timeout_ms *= match quality {
            NetworkQuality::Slow => t.slow_network_factor,
            NetworkQuality::Fast => t.fast_network_factor,
            NetworkQuality::Normal => 1.0,
        };

        let clamped = if timeout_ms.is_finite() {
            timeout_ms.clamp(t.min_ms as f64, t.max_ms as f64)
        } else {
            t.max_ms as f64
        };
        Duration::from_millis(clamped.round() as u64)
    }
}

/// NaN, negative or overflowing products saturate to `MAX_INTERVAL`.
fn saturating_interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL))
}
