//! Single poll cycle for one service.
//!
//! # Responsibilities
//! - Enforce at most one poll in flight per service
//! - Consult the circuit breaker before touching the network
//! - Run the probe with the adaptive timeout and classify the outcome
//! - Apply the outcome to latency history, circuit breaker, and store
//!
//! # Design Decisions
//! - Every applied poll ends as a `ServiceResult`; errors never escape
//! - Results are applied in completion order because polls never overlap
//! - A stopped poller discards late results instead of applying them

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::environment::EnvironmentSignals;
use crate::health::adaptive::{AdaptivePolicy, PollDelay};
use crate::health::classifier::classify_error;
use crate::health::probe::Probe;
use crate::health::registry::ServiceRegistry;
use crate::health::store::HealthStore;
use crate::health::types::{ServiceKey, ServiceResult, ServiceStatus};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreakerRegistry, CircuitState};

/// What happened when a poll was requested.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The probe ran and its classified result was applied.
    Completed { result: ServiceResult, latency: Duration },
    /// The circuit is open; no network call was made.
    CircuitOpen { cached: Option<ServiceResult> },
    /// Another poll for this service is still running.
    AlreadyInFlight,
    /// The poller was stopped; nothing was applied.
    Stopped,
}

/// Everything a poller needs, shared across all services.
#[derive(Clone)]
pub struct PollContext {
    pub registry: Arc<ServiceRegistry>,
    pub store: Arc<HealthStore>,
    pub policy: Arc<AdaptivePolicy>,
    pub environment: Arc<dyn EnvironmentSignals>,
}

/// Polls one service.
pub struct ServicePoller {
    key: ServiceKey,
    probe: Arc<dyn Probe>,
    ctx: PollContext,
    in_flight: AtomicBool,
    stopped: AtomicBool,
}

/// Clears the in-flight flag even if the poll future is dropped.
///
/// Also owns a claimed Half-Open trial, so a poll cancelled mid-flight
/// hands the trial back to the breaker.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    store: Option<&'a HealthStore>,
    trial: Option<(&'a CircuitBreakerRegistry, &'a ServiceKey)>,
}

impl<'a> InFlightGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        Self {
            flag,
            store: None,
            trial: None,
        }
    }

    /// Count this poll in the store's `is_polling` flag.
    fn mark_polling(&mut self, store: &'a HealthStore) {
        store.poll_started();
        self.store = Some(store);
    }

    fn hold_trial(&mut self, breakers: &'a CircuitBreakerRegistry, key: &'a ServiceKey) {
        self.trial = Some((breakers, key));
    }

    /// The trial outcome was recorded; nothing to hand back.
    fn settle_trial(&mut self) {
        self.trial = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some((breakers, key)) = self.trial.take() {
            breakers.release_trial(key);
        }
        self.flag.store(false, Ordering::SeqCst);
        if let Some(store) = self.store {
            store.poll_finished();
        }
    }
}

impl ServicePoller {
    pub fn new(key: ServiceKey, probe: Arc<dyn Probe>, ctx: PollContext) -> Self {
        Self {
            key,
            probe,
            ctx,
            in_flight: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop applying results. In-flight calls run to their own timeout.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Last result published for this service.
    pub fn cached_result(&self) -> Option<ServiceResult> {
        self.ctx.store.get_snapshot().result(&self.key).cloned()
    }

    /// Delay until the next poll given the current state.
    pub fn next_delay(&self) -> PollDelay {
        let last = self.cached_result().map(|r| r.status);
        let circuit = self.ctx.registry.breakers().state(&self.key);
        let env = self.ctx.environment.current();
        self.ctx.policy.adaptive_interval(last, circuit, &env)
    }

    /// Run one poll unless one is already running.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.is_stopped() {
            return PollOutcome::Stopped;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(service = %self.key, "Poll already in flight, ignoring request");
            metrics::record_poll_skipped(&self.key, "in_flight");
            return PollOutcome::AlreadyInFlight;
        }
        let mut guard = InFlightGuard::new(&self.in_flight);

        let breakers = self.ctx.registry.breakers();
        if !breakers.try_acquire(&self.key) {
            tracing::debug!(service = %self.key, "Circuit open, skipping poll");
            metrics::record_poll_skipped(&self.key, "circuit_open");
            return PollOutcome::CircuitOpen {
                cached: self.cached_result(),
            };
        }
        if breakers.state(&self.key) == CircuitState::HalfOpen {
            guard.hold_trial(breakers, &self.key);
        }

        guard.mark_polling(&self.ctx.store);
        let latency_history = self.ctx.registry.latency();
        let env = self.ctx.environment.current();
        let timeout = self
            .ctx
            .policy
            .adaptive_timeout(latency_history.average_latency(&self.key), env.network_quality);

        tracing::debug!(service = %self.key, timeout_ms = timeout.as_millis() as u64, "Polling service");
        let start = Instant::now();
        let outcome = self.probe.check(timeout).await;
        let latency = start.elapsed();

        if self.is_stopped() {
            tracing::debug!(service = %self.key, "Discarding result from stopped poller");
            return PollOutcome::Stopped;
        }

        let (result, reachable) = match outcome {
            Ok(result) => (result, true),
            Err(e) => {
                tracing::warn!(service = %self.key, error = %e, "Health probe failed");
                (classify_error(&e), false)
            }
        };
        let success = reachable && matches!(result.status, ServiceStatus::Up | ServiceStatus::Degraded);

        latency_history.record(&self.key, latency.as_millis() as u64);
        let circuit = breakers.record_response(&self.key, success);
        guard.settle_trial();
        metrics::record_poll(&self.key, result.status, latency);

        tracing::info!(
            service = %self.key,
            status = %result.status,
            latency_ms = latency.as_millis() as u64,
            circuit = %circuit,
            "Poll completed"
        );

        self.ctx.store.record_result(&self.key, result.clone());
        PollOutcome::Completed { result, latency }
    }
}
