//! Per-service polling timer.
//!
//! # Responsibilities
//! - Poll once at start (unless suspended), then re-arm a single-shot timer
//! - Recompute the delay when the environment changes
//! - Accept forced polls, coalescing repeats while one is pending
//! - Stop on shutdown or when the handle is dropped
//!
//! # Design Decisions
//! - One task per service; a service never has two timers armed
//! - The delay is measured from the end of the last poll, so a changed
//!   environment moves the existing deadline instead of restarting it
//! - A forced poll that hits an open circuit does not push the timer out

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::environment::EnvironmentState;
use crate::health::adaptive::PollDelay;
use crate::health::poller::{PollOutcome, ServicePoller};
use crate::health::types::ServiceKey;

/// Result of asking for an immediate poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedPoll {
    /// The scheduler will poll as soon as it is free.
    Scheduled,
    /// A poll is running right now; its result will be the fresh one.
    AlreadyInFlight,
    /// A forced poll is already queued.
    AlreadyPending,
    /// The scheduler has exited.
    Stopped,
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    poller: Arc<ServicePoller>,
    force_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn key(&self) -> &ServiceKey {
        self.poller.key()
    }

    pub fn poller(&self) -> &Arc<ServicePoller> {
        &self.poller
    }

    /// Poll now instead of waiting for the timer.
    pub fn force_immediate_poll(&self) -> ForcedPoll {
        if self.poller.is_stopped() {
            return ForcedPoll::Stopped;
        }
        if self.poller.is_polling() {
            return ForcedPoll::AlreadyInFlight;
        }
        match self.force_tx.try_send(()) {
            Ok(()) => ForcedPoll::Scheduled,
            Err(mpsc::error::TrySendError::Full(())) => ForcedPoll::AlreadyPending,
            Err(mpsc::error::TrySendError::Closed(())) => ForcedPoll::Stopped,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drop the command channel and return the task for joining.
    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

struct Scheduler {
    poller: Arc<ServicePoller>,
    force_rx: mpsc::Receiver<()>,
    env_rx: watch::Receiver<EnvironmentState>,
    shutdown: broadcast::Receiver<()>,
    last_finished: Option<Instant>,
}

/// Start the timer loop for one service.
pub fn spawn_scheduler(
    poller: Arc<ServicePoller>,
    env_rx: watch::Receiver<EnvironmentState>,
    shutdown: broadcast::Receiver<()>,
) -> SchedulerHandle {
    let (force_tx, force_rx) = mpsc::channel(1);
    let scheduler = Scheduler {
        poller: Arc::clone(&poller),
        force_rx,
        env_rx,
        shutdown,
        last_finished: None,
    };
    let task = tokio::spawn(scheduler.run());
    SchedulerHandle {
        poller,
        force_tx,
        task,
    }
}

impl Scheduler {
    fn deadline(&self) -> Option<Instant> {
        match self.poller.next_delay() {
            PollDelay::Suspended => None,
            PollDelay::After(delay) => Some(match self.last_finished {
                Some(at) => at + delay,
                None => Instant::now(),
            }),
        }
    }

    async fn run(mut self) {
        let key = self.poller.key().clone();
        tracing::debug!(service = %key, "Scheduler started");
        let mut env_open = true;
        let mut deadline = self.deadline();

        loop {
            let timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = timer => {
                    if !self.poll(false).await {
                        break;
                    }
                }
                command = self.force_rx.recv() => {
                    match command {
                        Some(()) => {
                            tracing::debug!(service = %key, "Forced poll");
                            if !self.poll(true).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                changed = self.env_rx.changed(), if env_open => {
                    if changed.is_err() {
                        env_open = false;
                    }
                }
                _ = self.shutdown.recv() => break,
            }

            deadline = self.deadline();
            match deadline {
                Some(at) => tracing::trace!(
                    service = %key,
                    in_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Next poll armed"
                ),
                None => tracing::debug!(service = %key, "Polling suspended"),
            }
        }

        tracing::debug!(service = %key, "Scheduler stopped");
    }

    /// Returns `false` once the poller has been stopped.
    async fn poll(&mut self, forced: bool) -> bool {
        let outcome = self.poller.poll_once().await;
        // Requests that arrived mid-poll are satisfied by this result.
        while self.force_rx.try_recv().is_ok() {}

        match outcome {
            PollOutcome::Stopped => return false,
            PollOutcome::CircuitOpen { .. } | PollOutcome::AlreadyInFlight if forced => {}
            _ => self.last_finished = Some(Instant::now()),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvironmentSignals, HostEnvironment};
    use crate::health::adaptive::AdaptivePolicy;
    use crate::health::poller::PollContext;
    use crate::health::probe::probe_fn;
    use crate::health::registry::ServiceRegistry;
    use crate::health::store::HealthStore;
    use crate::health::types::{ConsolidatedHealth, ServiceResult, ServiceStatus};
    use crate::resilience::timeouts::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Fixture {
        calls: Arc<AtomicU32>,
        env: Arc<HostEnvironment>,
        store: Arc<HealthStore>,
        shutdown: broadcast::Sender<()>,
        handle: SchedulerHandle,
    }

    fn fixture(visible: bool, status: Option<ServiceStatus>) -> Fixture {
        let key = ServiceKey::from("backend");
        let calls = Arc::new(AtomicU32::new(0));
        let env = Arc::new(HostEnvironment::new(EnvironmentState {
            visible,
            ..Default::default()
        }));
        let store = Arc::new(HealthStore::new(ConsolidatedHealth::initial([key.clone()], visible)));
        let ctx = PollContext {
            registry: Arc::new(ServiceRegistry::default()),
            store: Arc::clone(&store),
            policy: Arc::new(AdaptivePolicy::default()),
            environment: env.clone(),
        };
        let probe = probe_fn({
            let calls = Arc::clone(&calls);
            move |_timeout| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match status {
                        Some(status) => Ok(ServiceResult::new(status, "probe")),
                        None => Err(TransportError::Network("connection refused".into())),
                    }
                }
            }
        });
        let poller = Arc::new(ServicePoller::new(key, Arc::new(probe), ctx));
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_scheduler(poller, env.subscribe(), shutdown_rx);
        Fixture {
            calls,
            env,
            store,
            shutdown,
            handle,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_at_interval() {
        let f = fixture(true, Some(ServiceStatus::Up));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(14)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_polls_faster() {
        let f = fixture(true, Some(ServiceStatus::Degraded));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_without_cache_suspends_until_visible() {
        let f = fixture(false, Some(ServiceStatus::Up));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);

        f.env.set_visible(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert!(f.store.get_snapshot().result(f.handle.key()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hiding_stretches_existing_deadline() {
        let f = fixture(true, Some(ServiceStatus::Up));
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.env.set_visible(false);
        settle().await;

        // 15s × 3 measured from the end of the first poll.
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_poll_coalesces() {
        let f = fixture(true, Some(ServiceStatus::Up));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        assert_eq!(f.handle.force_immediate_poll(), ForcedPoll::Scheduled);
        let second = f.handle.force_immediate_poll();
        assert!(matches!(second, ForcedPoll::AlreadyPending | ForcedPoll::AlreadyInFlight));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_switches_to_fixed_interval() {
        let f = fixture(true, None);
        // Down results: immediate, then every 45s until the breaker opens.
        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(45)).await;
        }
        assert_eq!(f.calls.load(Ordering::SeqCst), 5);

        // Breaker open: the next poll is a half-open trial 60s later.
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 5);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_poll_on_open_circuit_keeps_trial_time() {
        let f = fixture(true, None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(45)).await;
        }
        assert_eq!(f.calls.load(Ordering::SeqCst), 5);

        // Mid-cooldown: the forced poll is turned away by the breaker.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(f.handle.force_immediate_poll(), ForcedPoll::Scheduled);
        settle().await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 5);

        // Trial still lands 60s after the last real poll, not after the forced one.
        tokio::time::sleep(Duration::from_millis(39_700)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 5);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let f = fixture(true, Some(ServiceStatus::Up));
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.shutdown.send(()).unwrap();
        settle().await;
        assert!(f.handle.is_finished());
        assert_eq!(f.handle.force_immediate_poll(), ForcedPoll::Stopped);
    }
}
