//! Shared per-service polling state.

use crate::config::PollerConfig;
use crate::health::latency::ResponseTimeTracker;
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;

/// Circuit breakers and latency history for every service.
///
/// Constructed once and shared by reference with every poller, so all
/// consumers of a service see the same breaker and history.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    breakers: CircuitBreakerRegistry,
    latency: ResponseTimeTracker,
}

impl ServiceRegistry {
    pub fn new(breakers: CircuitBreakerRegistry, latency: ResponseTimeTracker) -> Self {
        Self { breakers, latency }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(
            CircuitBreakerRegistry::from_config(&config.circuit_breaker),
            ResponseTimeTracker::new(config.latency.history_size),
        )
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn latency(&self) -> &ResponseTimeTracker {
        &self.latency
    }
}
