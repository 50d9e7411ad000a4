//! Exponential backoff.

use std::time::Duration;

/// Delay before retry number `attempt + 1`: `base_ms * multiplier^attempt`, capped at `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, multiplier: f64, max_ms: u64) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay_ms = base_ms as f64 * multiplier.powi(exponent);
    let capped = if delay_ms.is_finite() {
        delay_ms.min(max_ms as f64)
    } else {
        max_ms as f64
    };
    Duration::from_millis(capped.max(0.0) as u64)
}
