//! Overall status derivation.
//!
//! # Aggregation Rule
//!
//! - Nobody has reported yet -> Unknown
//! - Every reporting service Up -> Up
//! - Two or more Down/Error -> Down
//! - Exactly one Down/Error -> Degraded
//! - Anything else (e.g. some Degraded) -> Degraded
//!
//! Services without a result are ignored. The function is pure so it can be
//! tested without a scheduler or network.

use std::collections::BTreeMap;

use crate::health::types::{OverallStatus, ServiceKey, ServiceResult, ServiceStatus};

/// Combine the latest result of every service into one status.
pub fn aggregate(services: &BTreeMap<ServiceKey, Option<ServiceResult>>) -> OverallStatus {
    aggregate_statuses(services.values().flatten().map(|r| r.status))
}

/// Same rule over bare statuses.
pub fn aggregate_statuses<I>(statuses: I) -> OverallStatus
where
    I: IntoIterator<Item = ServiceStatus>,
{
    let mut reporting = 0usize;
    let mut up = 0usize;
    let mut failing = 0usize;

    for status in statuses {
        reporting += 1;
        if status == ServiceStatus::Up {
            up += 1;
        } else if status.is_failing() {
            failing += 1;
        }
    }

    if reporting == 0 {
        OverallStatus::Unknown
    } else if up == reporting {
        OverallStatus::Up
    } else if failing >= 2 {
        OverallStatus::Down
    } else {
        OverallStatus::Degraded
    }
}
