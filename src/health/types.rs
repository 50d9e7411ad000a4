//! Service health types shared by the polling engine and its consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Stable identifier of a monitored service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Canonical status of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Degraded,
    Down,
    Error,
}

impl ServiceStatus {
    /// Down and Error both count as failing for aggregation.
    pub fn is_failing(self) -> bool {
        matches!(self, ServiceStatus::Down | ServiceStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Up => "up",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Down => "down",
            ServiceStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one completed poll. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub status: ServiceStatus,
    pub message: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ServiceResult {
    /// A result stamped with the current time and no metrics or error.
    pub fn new(status: ServiceStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            metrics: BTreeMap::new(),
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, serde_json::Value>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Derived status of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Unknown,
    Up,
    Degraded,
    Down,
}

impl OverallStatus {
    /// Human-readable summary for display.
    pub fn summary(self) -> &'static str {
        match self {
            OverallStatus::Unknown => "Loading system status",
            OverallStatus::Up => "All systems operational",
            OverallStatus::Degraded => "Some systems are experiencing issues",
            OverallStatus::Down => "Major service outage",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallStatus::Unknown => "unknown",
            OverallStatus::Up => "up",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Down => "down",
        };
        f.write_str(s)
    }
}

/// Snapshot-level bookkeeping that does not affect health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetadata {
    /// Milliseconds since the Unix epoch of the last snapshot change.
    pub timestamp: u64,
    /// True while any service has a poll in flight.
    pub is_polling: bool,
    /// Mirrors host visibility.
    pub is_visible: bool,
}

/// Partial metadata update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub timestamp: Option<u64>,
    pub is_polling: Option<bool>,
    pub is_visible: Option<bool>,
}

impl HealthMetadata {
    pub fn apply(mut self, patch: MetadataPatch) -> Self {
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(is_polling) = patch.is_polling {
            self.is_polling = is_polling;
        }
        if let Some(is_visible) = patch.is_visible {
            self.is_visible = is_visible;
        }
        self
    }
}

/// Merged view of every service plus the derived overall status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedHealth {
    pub services: BTreeMap<ServiceKey, Option<ServiceResult>>,
    pub overall_status: OverallStatus,
    pub metadata: HealthMetadata,
}

impl ConsolidatedHealth {
    /// Initial snapshot: every service present and unreported.
    pub fn initial<I>(keys: I, is_visible: bool) -> Self
    where
        I: IntoIterator<Item = ServiceKey>,
    {
        Self {
            services: keys.into_iter().map(|k| (k, None)).collect(),
            overall_status: OverallStatus::Unknown,
            metadata: HealthMetadata {
                timestamp: now_millis(),
                is_polling: false,
                is_visible,
            },
        }
    }

    pub fn result(&self, key: &ServiceKey) -> Option<&ServiceResult> {
        self.services.get(key).and_then(Option::as_ref)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_statuses() {
        assert!(!ServiceStatus::Up.is_failing());
        assert!(!ServiceStatus::Degraded.is_failing());
        assert!(ServiceStatus::Down.is_failing());
        assert!(ServiceStatus::Error.is_failing());
    }

    #[test]
    fn test_initial_snapshot_is_unknown() {
        let snapshot = ConsolidatedHealth::initial(
            ["frontend", "backend"].into_iter().map(ServiceKey::from),
            true,
        );
        assert_eq!(snapshot.overall_status, OverallStatus::Unknown);
        assert_eq!(snapshot.services.len(), 2);
        assert!(snapshot.services.values().all(Option::is_none));
        assert!(snapshot.result(&"backend".into()).is_none());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut snapshot = ConsolidatedHealth::initial([ServiceKey::from("cache")], false);
        snapshot.metadata.timestamp = 42;
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["overallStatus"], "unknown");
        assert_eq!(json["services"]["cache"], serde_json::Value::Null);
        assert_eq!(json["metadata"]["isVisible"], false);
        assert_eq!(json["metadata"]["timestamp"], 42);
    }

    #[test]
    fn test_metadata_patch() {
        let meta = HealthMetadata {
            timestamp: 1,
            is_polling: false,
            is_visible: true,
        };
        let patched = meta.apply(MetadataPatch {
            is_polling: Some(true),
            ..Default::default()
        });
        assert_eq!(patched.timestamp, 1);
        assert!(patched.is_polling);
        assert!(patched.is_visible);
    }
}
