//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the poller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::environment::NetworkQuality;

/// Root configuration for the health poller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PollerConfig {
    /// Monitored services and their probe endpoints.
    pub services: Vec<ServiceConfig>,

    /// Base polling cadence and environment multipliers.
    pub polling: PollingConfig,

    /// Adaptive per-call timeout settings.
    pub timeouts: TimeoutConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Response-time history settings.
    pub latency: LatencyConfig,

    /// Transport retry settings.
    pub retries: RetryConfig,

    /// Initial host signals and the production signal adapter.
    pub environment: EnvironmentConfig,

    /// Admin HTTP surface.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A single monitored service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Stable service identifier (e.g., "backend", "database").
    pub key: String,

    /// Health endpoint URL.
    pub url: String,

    /// Per-service override of `retries.max_retries`.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Base intervals per status and environment multipliers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval after an `Up` result, in seconds.
    pub up_secs: u64,

    /// Interval after a `Degraded` result, in seconds.
    pub degraded_secs: u64,

    /// Interval after a `Down` result, in seconds.
    pub down_secs: u64,

    /// Interval after an `Error` result, in seconds.
    pub error_secs: u64,

    /// Fixed interval while the circuit is open, in seconds.
    pub open_circuit_secs: u64,

    /// Multiplier applied while the host is not visible.
    pub hidden_multiplier: f64,

    /// Multiplier applied while the battery is low.
    pub low_battery_multiplier: f64,

    /// Battery level (0..=1) below which the low-battery multiplier applies.
    pub low_battery_threshold: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            up_secs: 15,
            degraded_secs: 5,
            down_secs: 45,
            error_secs: 30,
            open_circuit_secs: 60,
            hidden_multiplier: 3.0,
            low_battery_multiplier: 2.0,
            low_battery_threshold: 0.2,
        }
    }
}

/// Adaptive timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout used when no latency history exists, in milliseconds.
    pub base_ms: u64,

    /// Lower clamp, in milliseconds.
    pub min_ms: u64,

    /// Upper clamp, in milliseconds.
    pub max_ms: u64,

    /// Average latency under which the connection counts as fast.
    pub fast_latency_ms: u64,

    /// Average latency over which the connection counts as slow.
    pub slow_latency_ms: u64,

    /// Factor applied on a slow network.
    pub slow_network_factor: f64,

    /// Factor applied on a fast network.
    pub fast_network_factor: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_ms: 6_000,
            min_ms: 3_000,
            max_ms: 15_000,
            fast_latency_ms: 500,
            slow_latency_ms: 2_000,
            slow_network_factor: 1.5,
            fast_network_factor: 0.8,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time after the last failure before a trial poll is allowed.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

/// Response-time history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Number of samples retained per service.
    pub history_size: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self { history_size: 10 }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            multiplier: 2.5,
            max_delay_ms: 30_000,
        }
    }
}

/// Host signal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Initial visibility.
    pub visible: bool,

    /// Initial battery level (0..=1).
    pub battery_level: f64,

    /// Initial network quality.
    pub network_quality: NetworkQuality,

    /// Optional sysfs capacity file (percent) refreshed periodically.
    pub battery_path: Option<String>,

    /// Battery refresh period in seconds.
    pub battery_refresh_secs: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            visible: true,
            battery_level: 1.0,
            network_quality: NetworkQuality::Normal,
            battery_path: None,
            battery_refresh_secs: 60,
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin HTTP surface.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
