//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check service identity (non-empty, unique keys, parseable URLs)
//! - Validate value ranges (intervals in (0, 1 day], finite factors > 0,
//!   clamps ordered, levels in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PollerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::PollerConfig;

/// Upper bound for any configured polling interval.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no services configured")]
    NoServices,

    #[error("service #{0} has an empty key")]
    EmptyServiceKey(usize),

    #[error("duplicate service key '{0}'")]
    DuplicateServiceKey(String),

    #[error("service '{key}' has an invalid url '{url}'")]
    InvalidServiceUrl { key: String, url: String },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("{field} must not exceed {max} seconds")]
    IntervalTooLarge { field: &'static str, max: u64 },

    #[error("{0} must be a finite number greater than zero")]
    NonPositiveFactor(&'static str),

    #[error("{0} must be within [0, 1]")]
    OutOfUnitRange(&'static str),

    #[error("timeouts.min_ms ({min}) exceeds timeouts.max_ms ({max})")]
    TimeoutBoundsInverted { min: u64, max: u64 },

    #[error("timeouts.base_ms ({base}) is outside [{min}, {max}]")]
    BaseTimeoutOutOfBounds { base: u64, min: u64, max: u64 },

    #[error("circuit_breaker.failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    #[error("latency.history_size must be greater than zero")]
    ZeroHistorySize,

    #[error("admin.api_key must not be empty while the admin API is enabled")]
    EmptyApiKey,

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidBindAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PollerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_services(config, &mut errors);
    validate_polling(config, &mut errors);
    validate_timeouts(config, &mut errors);

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.latency.history_size == 0 {
        errors.push(ValidationError::ZeroHistorySize);
    }
    check_factor("retries.multiplier", config.retries.multiplier, &mut errors);
    if !(0.0..=1.0).contains(&config.environment.battery_level) {
        errors.push(ValidationError::OutOfUnitRange("environment.battery_level"));
    }
    if config.environment.battery_path.is_some() && config.environment.battery_refresh_secs == 0 {
        errors.push(ValidationError::ZeroInterval("environment.battery_refresh_secs"));
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidBindAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_services(config: &PollerConfig, errors: &mut Vec<ValidationError>) {
    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
        return;
    }

    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if service.key.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceKey(i));
        } else if !seen.insert(service.key.as_str()) {
            errors.push(ValidationError::DuplicateServiceKey(service.key.clone()));
        }

        if url::Url::parse(&service.url).is_err() {
            errors.push(ValidationError::InvalidServiceUrl {
                key: service.key.clone(),
                url: service.url.clone(),
            });
        }
    }
}

fn validate_polling(config: &PollerConfig, errors: &mut Vec<ValidationError>) {
    let polling = &config.polling;
    let intervals = [
        ("polling.up_secs", polling.up_secs),
        ("polling.degraded_secs", polling.degraded_secs),
        ("polling.down_secs", polling.down_secs),
        ("polling.error_secs", polling.error_secs),
        ("polling.open_circuit_secs", polling.open_circuit_secs),
    ];
    for (field, value) in intervals {
        if value == 0 {
            errors.push(ValidationError::ZeroInterval(field));
        } else if value > MAX_INTERVAL_SECS {
            errors.push(ValidationError::IntervalTooLarge {
                field,
                max: MAX_INTERVAL_SECS,
            });
        }
    }

    check_factor("polling.hidden_multiplier", polling.hidden_multiplier, errors);
    check_factor("polling.low_battery_multiplier", polling.low_battery_multiplier, errors);
    if !(0.0..=1.0).contains(&polling.low_battery_threshold) {
        errors.push(ValidationError::OutOfUnitRange("polling.low_battery_threshold"));
    }
}

fn validate_timeouts(config: &PollerConfig, errors: &mut Vec<ValidationError>) {
    let t = &config.timeouts;
    if t.min_ms > t.max_ms {
        errors.push(ValidationError::TimeoutBoundsInverted {
            min: t.min_ms,
            max: t.max_ms,
        });
    } else if t.base_ms < t.min_ms || t.base_ms > t.max_ms {
        errors.push(ValidationError::BaseTimeoutOutOfBounds {
            base: t.base_ms,
            min: t.min_ms,
            max: t.max_ms,
        });
    }

    check_factor("timeouts.slow_network_factor", t.slow_network_factor, errors);
    check_factor("timeouts.fast_network_factor", t.fast_network_factor, errors);
}

fn check_factor(field: &'static str, value: f64, errors: &mut Vec<ValidationError>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(ValidationError::NonPositiveFactor(field));
    }
}
