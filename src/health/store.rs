//! Consolidated health store.
//!
//! # Responsibilities
//! - Hold the latest `ConsolidatedHealth` snapshot
//! - Replace it atomically and notify subscribers once per change
//! - Offer a metadata-only path that skips aggregation and uses a lighter event
//!
//! # Design Decisions
//! - Snapshots live behind `ArcSwap`; readers never see a half-applied update
//! - Writers from different services merge with read-copy-update
//! - Subscribers get a broadcast receiver; slow ones observe `Lagged` and
//!   can resync with `get_snapshot()`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::health::aggregator::aggregate;
use crate::health::types::{
    now_millis, ConsolidatedHealth, HealthMetadata, MetadataPatch, ServiceKey, ServiceResult,
};
use crate::observability::metrics;

const EVENT_CAPACITY: usize = 64;

/// Notification sent to store subscribers.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Substantive health change with the full new snapshot.
    Health(Arc<ConsolidatedHealth>),
    /// Cosmetic change; only metadata moved.
    Metadata(HealthMetadata),
}

/// Process-wide latest snapshot.
#[derive(Debug)]
pub struct HealthStore {
    current: ArcSwap<ConsolidatedHealth>,
    events: broadcast::Sender<StoreEvent>,
    in_flight: AtomicUsize,
}

impl HealthStore {
    pub fn new(initial: ConsolidatedHealth) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: ArcSwap::from_pointee(initial),
            events,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current immutable snapshot.
    pub fn get_snapshot(&self) -> Arc<ConsolidatedHealth> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replace the whole snapshot. The overall status is re-derived from its services.
    pub fn update(&self, mut snapshot: ConsolidatedHealth) -> Arc<ConsolidatedHealth> {
        snapshot.overall_status = aggregate(&snapshot.services);
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        self.publish_health(&snapshot);
        snapshot
    }

    /// Merge one service's new result into the snapshot.
    pub fn record_result(&self, key: &ServiceKey, result: ServiceResult) -> Arc<ConsolidatedHealth> {
        let mut next = None;
        self.current.rcu(|current| {
            let mut snapshot = ConsolidatedHealth::clone(current);
            snapshot.services.insert(key.clone(), Some(result.clone()));
            snapshot.overall_status = aggregate(&snapshot.services);
            snapshot.metadata.timestamp = now_millis();
            let snapshot = Arc::new(snapshot);
            next = Some(Arc::clone(&snapshot));
            snapshot
        });

        let snapshot = next.unwrap_or_else(|| self.current.load_full());
        tracing::debug!(
            service = %key,
            status = %result.status,
            overall = %snapshot.overall_status,
            "Health snapshot updated"
        );
        self.publish_health(&snapshot);
        snapshot
    }

    /// Change metadata only. Does not aggregate and emits `StoreEvent::Metadata`.
    pub fn update_metadata_only(&self, patch: MetadataPatch) -> HealthMetadata {
        let mut next = None;
        self.current.rcu(|current| {
            let mut snapshot = ConsolidatedHealth::clone(current);
            snapshot.metadata = snapshot.metadata.apply(patch);
            next = Some(snapshot.metadata);
            Arc::new(snapshot)
        });

        let metadata = next.unwrap_or_else(|| self.current.load().metadata);
        let _ = self.events.send(StoreEvent::Metadata(metadata));
        metadata
    }

    /// Mark a poll as started; flips `is_polling` on the first one.
    pub fn poll_started(&self) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.sync_polling_flag();
        }
    }

    /// Mark a poll as finished; clears `is_polling` when none remain.
    pub fn poll_finished(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        if previous == 1 {
            self.sync_polling_flag();
        }
    }

    /// Write `is_polling` from the counter as seen inside the swap, so the
    /// last committed write always matches the count.
    fn sync_polling_flag(&self) {
        let mut next = None;
        self.current.rcu(|current| {
            let mut snapshot = ConsolidatedHealth::clone(current);
            snapshot.metadata.is_polling = self.in_flight.load(Ordering::SeqCst) > 0;
            next = Some(snapshot.metadata);
            Arc::new(snapshot)
        });

        let metadata = next.unwrap_or_else(|| self.current.load().metadata);
        let _ = self.events.send(StoreEvent::Metadata(metadata));
    }

    fn publish_health(&self, snapshot: &Arc<ConsolidatedHealth>) {
        metrics::record_overall_status(snapshot.overall_status);
        let _ = self.events.send(StoreEvent::Health(Arc::clone(snapshot)));
    }
}
