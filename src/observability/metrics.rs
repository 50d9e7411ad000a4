//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define poller metrics (polls, latency, skips, status, circuits)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service and aggregate metrics
//!
//! # Metrics
//! - `health_polls_total` (counter): completed polls by service, status
//! - `health_poll_duration_seconds` (histogram): probe latency by service
//! - `health_poll_skipped_total` (counter): skipped polls by service, reason
//! - `health_service_status` (gauge): 1=up, 0.5=degraded, 0=down/error
//! - `health_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `health_overall_status` (gauge): same encoding as service status, -1=unknown

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::types::{OverallStatus, ServiceKey, ServiceStatus};
use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record a completed poll and its latency.
pub fn record_poll(key: &ServiceKey, status: ServiceStatus, latency: Duration) {
    metrics::counter!(
        "health_polls_total",
        "service" => key.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
    metrics::histogram!("health_poll_duration_seconds", "service" => key.to_string())
        .record(latency.as_secs_f64());
    record_service_status(key, status);
}

/// Record a poll that never reached the network.
pub fn record_poll_skipped(key: &ServiceKey, reason: &'static str) {
    metrics::counter!(
        "health_poll_skipped_total",
        "service" => key.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_service_status(key: &ServiceKey, status: ServiceStatus) {
    metrics::gauge!("health_service_status", "service" => key.to_string()).set(status_value(status));
}

pub fn record_circuit_state(key: &ServiceKey, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("health_circuit_state", "service" => key.to_string()).set(value);
}

pub fn record_overall_status(status: OverallStatus) {
    let value = match status {
        OverallStatus::Unknown => -1.0,
        OverallStatus::Up => 1.0,
        OverallStatus::Degraded => 0.5,
        OverallStatus::Down => 0.0,
    };
    metrics::gauge!("health_overall_status").set(value);
}

fn status_value(status: ServiceStatus) -> f64 {
    match status {
        ServiceStatus::Up => 1.0,
        ServiceStatus::Degraded => 0.5,
        ServiceStatus::Down | ServiceStatus::Error => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_encoding() {
        assert_eq!(status_value(ServiceStatus::Up), 1.0);
        assert_eq!(status_value(ServiceStatus::Degraded), 0.5);
        assert_eq!(status_value(ServiceStatus::Error), 0.0);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let key = ServiceKey::from("backend");
        record_poll(&key, ServiceStatus::Up, Duration::from_millis(12));
        record_poll_skipped(&key, "circuit_open");
        record_circuit_state(&key, CircuitState::Open);
        record_overall_status(OverallStatus::Unknown);
    }
}
