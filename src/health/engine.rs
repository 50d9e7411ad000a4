//! Polling engine: wires probes, schedulers, and the store together.
//!
//! # Responsibilities
//! - Own one poller and one scheduler per configured service
//! - Publish visibility changes to the store as metadata-only updates
//! - Expose refresh, snapshot, and circuit inspection to the admin surface
//!
//! # Design Decisions
//! - Circuit breakers and latency history are shared through one
//!   `ServiceRegistry`, never copied per consumer
//! - `stop()` marks every poller stopped first so late results are dropped

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::PollerConfig;
use crate::environment::EnvironmentSignals;
use crate::health::adaptive::AdaptivePolicy;
use crate::health::poller::{PollContext, PollOutcome, ServicePoller};
use crate::health::probe::{HttpProbe, Probe};
use crate::health::registry::ServiceRegistry;
use crate::health::scheduler::{spawn_scheduler, ForcedPoll, SchedulerHandle};
use crate::health::store::{HealthStore, StoreEvent};
use crate::health::types::{ConsolidatedHealth, MetadataPatch, ServiceKey};
use crate::lifecycle::shutdown::{join_with_deadline, Shutdown};
use crate::resilience::circuit_breaker::CircuitSnapshot;
use crate::resilience::retries::RetryPolicy;

const STOP_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown service: {0}")]
    UnknownService(ServiceKey),

    #[error("service registered twice: {0}")]
    DuplicateService(ServiceKey),

    #[error("no services registered")]
    NoServices,

    #[error("engine already started")]
    AlreadyStarted,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Collects probes and shared state before the engine is built.
pub struct EngineBuilder {
    registry: Arc<ServiceRegistry>,
    policy: AdaptivePolicy,
    probes: Vec<(ServiceKey, Arc<dyn Probe>)>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ServiceRegistry::default()),
            policy: AdaptivePolicy::default(),
            probes: Vec::new(),
        }
    }

    pub fn registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn policy(mut self, policy: AdaptivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn probe(mut self, key: impl Into<ServiceKey>, probe: impl Probe + 'static) -> Self {
        self.probes.push((key.into(), Arc::new(probe)));
        self
    }

    pub fn shared_probe(mut self, key: impl Into<ServiceKey>, probe: Arc<dyn Probe>) -> Self {
        self.probes.push((key.into(), probe));
        self
    }

    pub fn build(self, environment: Arc<dyn EnvironmentSignals>) -> Result<HealthEngine, EngineError> {
        if self.probes.is_empty() {
            return Err(EngineError::NoServices);
        }

        let keys: Vec<ServiceKey> = self.probes.iter().map(|(k, _)| k.clone()).collect();
        let initial = ConsolidatedHealth::initial(keys, environment.current().visible);
        let ctx = PollContext {
            registry: self.registry,
            store: Arc::new(HealthStore::new(initial)),
            policy: Arc::new(self.policy),
            environment,
        };

        let mut pollers = BTreeMap::new();
        for (key, probe) in self.probes {
            if pollers.contains_key(&key) {
                return Err(EngineError::DuplicateService(key));
            }
            let poller = Arc::new(ServicePoller::new(key.clone(), probe, ctx.clone()));
            pollers.insert(key, poller);
        }

        Ok(HealthEngine {
            ctx,
            pollers,
            schedulers: DashMap::new(),
            started: AtomicBool::new(false),
            halt: Shutdown::new(),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Adaptive health polling for a fixed set of services.
pub struct HealthEngine {
    ctx: PollContext,
    pollers: BTreeMap<ServiceKey, Arc<ServicePoller>>,
    schedulers: DashMap<ServiceKey, SchedulerHandle>,
    started: AtomicBool,
    halt: Shutdown,
}

impl HealthEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// One `HttpProbe` per configured service, sharing a single HTTP client.
    pub fn from_config(
        config: &PollerConfig,
        environment: Arc<dyn EnvironmentSignals>,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("health-poller/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let retry = RetryPolicy::from(&config.retries);

        let mut builder = EngineBuilder::new()
            .registry(Arc::new(ServiceRegistry::from_config(config)))
            .policy(AdaptivePolicy::from_config(config));
        for service in &config.services {
            let policy = match service.max_retries {
                Some(n) => retry.clone().with_max_retries(n),
                None => retry.clone(),
            };
            builder = builder.probe(
                service.key.as_str(),
                HttpProbe::new(service.url.clone(), client.clone(), policy),
            );
        }
        builder.build(environment)
    }

    /// Spawn every scheduler. Each polls immediately unless suspended.
    pub fn start(&self, shutdown: &Shutdown) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        for (key, poller) in &self.pollers {
            let handle = spawn_scheduler(
                Arc::clone(poller),
                self.ctx.environment.subscribe(),
                shutdown.subscribe(),
            );
            self.schedulers.insert(key.clone(), handle);
        }
        self.spawn_visibility_bridge(shutdown);

        tracing::info!(services = self.pollers.len(), "Health engine started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceKey> {
        self.pollers.keys()
    }

    pub fn store(&self) -> &Arc<HealthStore> {
        &self.ctx.store
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.ctx.registry
    }

    pub fn get_snapshot(&self) -> Arc<ConsolidatedHealth> {
        self.ctx.store.get_snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.ctx.store.subscribe()
    }

    /// Ask one service's scheduler to poll now.
    pub fn refresh(&self, key: &ServiceKey) -> Result<ForcedPoll, EngineError> {
        let poller = self
            .pollers
            .get(key)
            .ok_or_else(|| EngineError::UnknownService(key.clone()))?;

        if let Some(handle) = self.schedulers.get(key) {
            return Ok(handle.force_immediate_poll());
        }
        if poller.is_stopped() {
            return Ok(ForcedPoll::Stopped);
        }
        if poller.is_polling() {
            return Ok(ForcedPoll::AlreadyInFlight);
        }
        // Not started yet: run a detached poll.
        let poller = Arc::clone(poller);
        tokio::spawn(async move {
            poller.poll_once().await;
        });
        Ok(ForcedPoll::Scheduled)
    }

    /// Force a poll of every service.
    pub fn refresh_all(&self) -> BTreeMap<ServiceKey, ForcedPoll> {
        tracing::info!("Refreshing all services");
        self.pollers
            .keys()
            .filter_map(|key| self.refresh(key).ok().map(|r| (key.clone(), r)))
            .collect()
    }

    /// Poll one service inline and return what happened.
    pub async fn poll_now(&self, key: &ServiceKey) -> Result<PollOutcome, EngineError> {
        let poller = self
            .pollers
            .get(key)
            .ok_or_else(|| EngineError::UnknownService(key.clone()))?;
        Ok(poller.poll_once().await)
    }

    pub fn circuits(&self) -> BTreeMap<ServiceKey, CircuitSnapshot> {
        let breakers = self.ctx.registry.breakers();
        self.pollers
            .keys()
            .map(|key| (key.clone(), breakers.snapshot(key)))
            .collect()
    }

    /// Stop polling. Results still in flight are discarded.
    pub async fn stop(&self) {
        for poller in self.pollers.values() {
            poller.stop();
        }
        self.halt.trigger();

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let keys: Vec<ServiceKey> = self.schedulers.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, handle)) = self.schedulers.remove(&key) {
                tasks.push(handle.into_task());
            }
        }

        join_with_deadline(tasks, STOP_DEADLINE).await;
        tracing::info!("Health engine stopped");
    }

    fn spawn_visibility_bridge(&self, shutdown: &Shutdown) {
        let store = Arc::clone(&self.ctx.store);
        let mut env_rx = self.ctx.environment.subscribe();
        let mut shutdown_rx = shutdown.subscribe();
        let mut halt_rx = self.halt.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = env_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let visible = env_rx.borrow_and_update().visible;
                        if store.get_snapshot().metadata.is_visible != visible {
                            tracing::debug!(visible, "Visibility changed");
                            store.update_metadata_only(MetadataPatch {
                                is_visible: Some(visible),
                                ..Default::default()
                            });
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                    _ = halt_rx.recv() => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{HostEnvironment, StaticEnvironment};
    use crate::health::probe::probe_fn;
    use crate::health::types::{OverallStatus, ServiceResult, ServiceStatus};

    fn up_probe() -> impl Probe {
        probe_fn(|_timeout| async { Ok(ServiceResult::new(ServiceStatus::Up, "ok")) })
    }

    #[test]
    fn test_builder_rejects_empty_and_duplicates() {
        let env: Arc<dyn EnvironmentSignals> = Arc::new(StaticEnvironment::default());
        assert!(matches!(
            HealthEngine::builder().build(env.clone()),
            Err(EngineError::NoServices)
        ));
        let duplicate = HealthEngine::builder()
            .probe("backend", up_probe())
            .probe("backend", up_probe())
            .build(env);
        assert!(matches!(duplicate, Err(EngineError::DuplicateService(k)) if k.as_str() == "backend"));
    }

    #[test]
    fn test_initial_snapshot_lists_every_service() {
        let engine = HealthEngine::builder()
            .probe("frontend", up_probe())
            .probe("backend", up_probe())
            .build(Arc::new(StaticEnvironment::default()))
            .unwrap();
        let snapshot = engine.get_snapshot();
        assert_eq!(snapshot.services.len(), 2);
        assert!(snapshot.services.values().all(Option::is_none));
        assert_eq!(snapshot.overall_status, OverallStatus::Unknown);
        assert!(snapshot.metadata.is_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_and_aggregates() {
        let engine = HealthEngine::builder()
            .probe("frontend", up_probe())
            .probe("backend", up_probe())
            .build(Arc::new(StaticEnvironment::default()))
            .unwrap();
        let shutdown = Shutdown::new();
        engine.start(&shutdown).unwrap();
        assert!(matches!(engine.start(&shutdown), Err(EngineError::AlreadyStarted)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.get_snapshot().overall_status, OverallStatus::Up);

        shutdown.trigger();
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_unknown_service() {
        let engine = HealthEngine::builder()
            .probe("backend", up_probe())
            .build(Arc::new(StaticEnvironment::default()))
            .unwrap();
        let err = engine.refresh(&ServiceKey::from("nope")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownService(_)));
        assert!(engine.poll_now(&ServiceKey::from("nope")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_is_metadata_only() {
        let env = Arc::new(HostEnvironment::new(Default::default()));
        let engine = HealthEngine::builder()
            .probe("backend", up_probe())
            .build(env.clone())
            .unwrap();
        let shutdown = Shutdown::new();
        engine.start(&shutdown).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let before = engine.get_snapshot();

        let mut events = engine.subscribe();
        env.set_visible(false);
        tokio::time::sleep(Duration::from_millis(10)).await;

        match events.recv().await.unwrap() {
            StoreEvent::Metadata(metadata) => assert!(!metadata.is_visible),
            other => panic!("unexpected event {:?}", other),
        }
        let after = engine.get_snapshot();
        assert_eq!(after.services, before.services);
        assert!(!after.metadata.is_visible);

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling() {
        let engine = HealthEngine::builder()
            .probe("backend", up_probe())
            .build(Arc::new(StaticEnvironment::default()))
            .unwrap();
        let shutdown = Shutdown::new();
        engine.start(&shutdown).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stop().await;

        assert_eq!(engine.refresh(&ServiceKey::from("backend")).unwrap(), ForcedPoll::Stopped);
        assert_eq!(
            engine.poll_now(&ServiceKey::from("backend")).await.unwrap(),
            PollOutcome::Stopped
        );
    }
}
