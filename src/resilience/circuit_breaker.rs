//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, polls pass through
//! - Open: backend assumed down, polls are skipped entirely
//! - Half-Open: one trial poll allowed to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: cooldown elapsed since last failure (checked lazily on query)
//! Half-Open → Closed: trial poll succeeds
//! Half-Open → Open: trial poll fails (timestamp refreshed)
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global), shared by all consumers
//! - No background timer; cooldown is evaluated when the state is read
//! - Single trial in Half-Open (prevents hammering recovering backend)

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::health::types::ServiceKey;
use crate::observability::metrics;

/// Circuit state of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
struct Breaker {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            trial_in_flight: false,
        }
    }
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Milliseconds since the last recorded failure.
    pub last_failure_age_ms: Option<u64>,
}

/// Circuit breakers for every service, keyed by `ServiceKey`.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<ServiceKey, Breaker>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold,
            cooldown,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.cooldown_secs))
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Record the outcome of a poll and return the resulting state.
    pub fn record_response(&self, key: &ServiceKey, success: bool) -> CircuitState {
        let mut breaker = self.breakers.entry(key.clone()).or_default();
        let previous = breaker.state;
        breaker.trial_in_flight = false;

        if success {
            breaker.failure_count = 0;
            breaker.state = CircuitState::Closed;
            if previous != CircuitState::Closed {
                tracing::info!(service = %key, from = %previous, "Circuit breaker closed after successful poll");
            }
        } else {
            breaker.failure_count = breaker.failure_count.saturating_add(1);
            breaker.last_failure = Some(Instant::now());
            if breaker.failure_count >= self.failure_threshold {
                breaker.state = CircuitState::Open;
                if previous != CircuitState::Open {
                    tracing::warn!(
                        service = %key,
                        failures = breaker.failure_count,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened"
                    );
                }
            }
        }

        let state = breaker.state;
        drop(breaker);
        metrics::record_circuit_state(key, state);
        state
    }

    /// Current state, promoting Open to Half-Open once the cooldown has elapsed.
    pub fn state(&self, key: &ServiceKey) -> CircuitState {
        match self.breakers.get_mut(key) {
            Some(mut breaker) => self.refresh(key, &mut breaker),
            None => CircuitState::Closed,
        }
    }

    /// True iff a poll must not reach the backend right now.
    pub fn should_skip_poll(&self, key: &ServiceKey) -> bool {
        let Some(mut breaker) = self.breakers.get_mut(key) else {
            return false;
        };
        match self.refresh(key, &mut breaker) {
            CircuitState::Closed => false,
            CircuitState::Open => true,
            CircuitState::HalfOpen => breaker.trial_in_flight,
        }
    }

    /// Claim permission to poll. In Half-Open only the first caller gets through
    /// until the trial outcome is recorded.
    pub fn try_acquire(&self, key: &ServiceKey) -> bool {
        let Some(mut breaker) = self.breakers.get_mut(key) else {
            return true;
        };
        match self.refresh(key, &mut breaker) {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen if breaker.trial_in_flight => false,
            CircuitState::HalfOpen => {
                breaker.trial_in_flight = true;
                tracing::info!(service = %key, "Circuit half-open, allowing trial poll");
                true
            }
        }
    }

    /// Release a claimed Half-Open trial without recording an outcome.
    pub fn release_trial(&self, key: &ServiceKey) {
        if let Some(mut breaker) = self.breakers.get_mut(key) {
            breaker.trial_in_flight = false;
        }
    }

    pub fn failure_count(&self, key: &ServiceKey) -> u32 {
        self.breakers.get(key).map(|b| b.failure_count).unwrap_or(0)
    }

    pub fn snapshot(&self, key: &ServiceKey) -> CircuitSnapshot {
        match self.breakers.get_mut(key) {
            Some(mut breaker) => {
                let state = self.refresh(key, &mut breaker);
                CircuitSnapshot {
                    state,
                    failure_count: breaker.failure_count,
                    last_failure_age_ms: breaker
                        .last_failure
                        .map(|at| at.elapsed().as_millis() as u64),
                }
            }
            None => CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_age_ms: None,
            },
        }
    }

    fn refresh(&self, key: &ServiceKey, breaker: &mut Breaker) -> CircuitState {
        if breaker.state == CircuitState::Open {
            let cooled = breaker
                .last_failure
                .map(|at| at.elapsed() >= self.cooldown)
                .unwrap_or(true);
            if cooled {
                breaker.state = CircuitState::HalfOpen;
                breaker.trial_in_flight = false;
                tracing::debug!(service = %key, "Circuit cooldown elapsed");
            }
        }
        breaker.state
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServiceKey {
        ServiceKey::from("backend")
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..4 {
            assert_eq!(registry.record_response(&key(), false), CircuitState::Closed);
            assert!(!registry.should_skip_poll(&key()));
        }
        assert_eq!(registry.record_response(&key(), false), CircuitState::Open);
        assert!(registry.should_skip_poll(&key()));
        assert!(!registry.try_acquire(&key()));
        assert_eq!(registry.failure_count(&key()), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failures() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..5 {
            registry.record_response(&key(), false);
        }
        assert!(registry.should_skip_poll(&key()));

        assert_eq!(registry.record_response(&key(), true), CircuitState::Closed);
        assert_eq!(registry.failure_count(&key()), 0);
        assert!(!registry.should_skip_poll(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cooldown() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..5 {
            registry.record_response(&key(), false);
        }

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(registry.state(&key()), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(registry.state(&key()), CircuitState::HalfOpen);
        assert!(!registry.should_skip_poll(&key()));

        // Exactly one trial gets through.
        assert!(registry.try_acquire(&key()));
        assert!(!registry.try_acquire(&key()));
        assert!(registry.should_skip_poll(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_timestamp() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..5 {
            registry.record_response(&key(), false);
        }
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(registry.try_acquire(&key()));

        assert_eq!(registry.record_response(&key(), false), CircuitState::Open);

        // Cooldown restarts from the trial failure.
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(registry.state(&key()), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(registry.state(&key()), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let registry = CircuitBreakerRegistry::new(2, Duration::from_secs(10));
        registry.record_response(&key(), false);
        registry.record_response(&key(), false);
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(registry.try_acquire(&key()));
        assert_eq!(registry.record_response(&key(), true), CircuitState::Closed);
        assert!(registry.try_acquire(&key()));
        assert!(registry.try_acquire(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_independent() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(60));
        registry.record_response(&key(), false);
        assert!(registry.should_skip_poll(&key()));
        assert!(!registry.should_skip_poll(&ServiceKey::from("cache")));
        assert_eq!(registry.snapshot(&ServiceKey::from("cache")).state, CircuitState::Closed);
    }
}
