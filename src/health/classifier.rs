//! Outcome classification.
//!
//! # Responsibilities
//! - Map backend status strings onto the canonical `ServiceStatus`
//! - Turn transport failures into `ServiceResult` values
//!
//! # Design Decisions
//! - Classification never fails: every poll ends as a `ServiceResult`
//! - Timeouts are `Degraded` (slow is not dead), connection failures `Down`
//! - Non-2xx and unknown failures are `Error`; the original text is kept

use std::collections::BTreeMap;

use crate::health::types::{ServiceResult, ServiceStatus};
use crate::resilience::timeouts::TransportError;

/// Map a backend-reported status string. Unrecognized values are `Error`.
pub fn classify_status(raw: &str) -> ServiceStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "healthy" => ServiceStatus::Up,
        "degraded" => ServiceStatus::Degraded,
        "unhealthy" => ServiceStatus::Down,
        _ => ServiceStatus::Error,
    }
}

/// Build a result from a successful probe payload.
pub fn classify_payload(
    raw_status: &str,
    message: Option<&str>,
    metrics: BTreeMap<String, serde_json::Value>,
) -> ServiceResult {
    let status = classify_status(raw_status);
    let message = match message {
        Some(m) if !m.trim().is_empty() => m.to_string(),
        _ => default_message(status).to_string(),
    };

    let result = ServiceResult::new(status, message).with_metrics(metrics);
    if status == ServiceStatus::Error {
        result.with_error(format!("unrecognized status '{}'", raw_status))
    } else {
        result
    }
}

/// Build a result from a failed probe. Metrics are always empty.
pub fn classify_error(error: &TransportError) -> ServiceResult {
    let (status, message) = match error {
        TransportError::Timeout { .. } => (ServiceStatus::Degraded, "Health check timed out"),
        TransportError::Network(_) => (ServiceStatus::Down, "Service unreachable"),
        TransportError::Http { .. } => (ServiceStatus::Error, "Health check returned an error status"),
        TransportError::Body(_) => (ServiceStatus::Error, "Health check returned an unreadable response"),
        TransportError::Other(text) => classify_message(text),
    };

    ServiceResult::new(status, message).with_error(error.to_string())
}

// Probes outside this crate may only hand back free text.
fn classify_message(text: &str) -> (ServiceStatus, &'static str) {
    let lower = text.to_ascii_lowercase();
    if lower.contains("abort") || lower.contains("timeout") || lower.contains("timed out") {
        (ServiceStatus::Degraded, "Health check timed out")
    } else if lower.contains("network") || lower.contains("connection") || lower.contains("failed to fetch") {
        (ServiceStatus::Down, "Service unreachable")
    } else {
        (ServiceStatus::Error, "Health check failed")
    }
}

fn default_message(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Up => "Service operational",
        ServiceStatus::Degraded => "Service degraded",
        ServiceStatus::Down => "Service unavailable",
        ServiceStatus::Error => "Service reported an unknown status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(classify_status("healthy"), ServiceStatus::Up);
        assert_eq!(classify_status(" Degraded "), ServiceStatus::Degraded);
        assert_eq!(classify_status("UNHEALTHY"), ServiceStatus::Down);
        assert_eq!(classify_status("green"), ServiceStatus::Error);
        assert_eq!(classify_status(""), ServiceStatus::Error);
    }

    #[test]
    fn test_payload_keeps_message_and_metrics() {
        let mut metrics = BTreeMap::new();
        metrics.insert("connections".to_string(), serde_json::json!(12));

        let result = classify_payload("healthy", Some("db ok"), metrics.clone());
        assert_eq!(result.status, ServiceStatus::Up);
        assert_eq!(result.message, "db ok");
        assert_eq!(result.metrics, metrics);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_unknown_payload_status_is_error() {
        let result = classify_payload("purple", None, BTreeMap::new());
        assert_eq!(result.status, ServiceStatus::Error);
        assert!(!result.message.is_empty());
        assert_eq!(result.error.as_deref(), Some("unrecognized status 'purple'"));
    }

    #[test]
    fn test_abort_is_degraded() {
        for err in [
            TransportError::Timeout { after_ms: 6000 },
            TransportError::Other("AbortError: The operation was aborted".into()),
        ] {
            let result = classify_error(&err);
            assert_eq!(result.status, ServiceStatus::Degraded);
            assert!(!result.message.is_empty());
            assert!(result.metrics.is_empty());
            assert_eq!(result.error, Some(err.to_string()));
        }
    }

    #[test]
    fn test_network_failure_is_down() {
        let result = classify_error(&TransportError::Network("connection refused".into()));
        assert_eq!(result.status, ServiceStatus::Down);

        let result = classify_error(&TransportError::Other("TypeError: Failed to fetch".into()));
        assert_eq!(result.status, ServiceStatus::Down);
    }

    #[test]
    fn test_http_error_preserves_status_code() {
        let result = classify_error(&TransportError::Http { status: 503 });
        assert_eq!(result.status, ServiceStatus::Error);
        assert!(result.error.unwrap().contains("503"));
    }

    #[test]
    fn test_anything_else_is_error() {
        let result = classify_error(&TransportError::Other("unexpected token".into()));
        assert_eq!(result.status, ServiceStatus::Error);
        assert_eq!(result.error.as_deref(), Some("unexpected token"));
    }
}
