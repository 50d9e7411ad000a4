//! Retry logic.
//!
//! # Responsibilities
//! - Execute retries with exponential backoff
//! - Re-throw the last error once retries are exhausted
//!
//! # Design Decisions
//! - Probes are GETs, so every failure is retryable
//! - Retries are bounded per call; sustained failure is the circuit breaker's job

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::{fetch_with_timeout, TransportError};

/// Bounded retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.multiplier, self.max_delay_ms)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            multiplier: config.multiplier,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `op` until it succeeds or `policy.max_retries` retries have failed.
///
/// `op` receives the zero-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, delay = ?delay, error = %e, "Retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// GET `url` with a per-attempt `timeout`, retrying per `policy`.
pub async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, TransportError> {
    retry_with_backoff(policy, |_| fetch_with_timeout(client, url, timeout)).await
}
