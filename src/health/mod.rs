//! Health polling subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (scheduler.rs), one per service:
//!     Timer fires / forced refresh / environment change
//!     → Poller (poller.rs)
//!
//! Poller:
//!     Single-flight guard
//!     → Circuit breaker gate (resilience::circuit_breaker)
//!     → Adaptive timeout (adaptive.rs, latency.rs)
//!     → Probe (probe.rs) → classifier.rs on error
//!     → Latency history, breaker, store.rs
//!
//! Store:
//!     Merge result → aggregator.rs → publish snapshot to subscribers
//! ```
//!
//! # Design Decisions
//! - Every outcome is a `ServiceResult`; nothing throws past the poller
//! - Per-service state lives in one shared registry (registry.rs)
//! - Snapshots are immutable; each update publishes a new one

pub mod adaptive;
pub mod aggregator;
pub mod classifier;
pub mod engine;
pub mod latency;
pub mod poller;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod types;

pub use engine::{EngineBuilder, EngineError, HealthEngine};
pub use probe::{probe_fn, HttpProbe, Probe, ProbeOutcome};
pub use types::{ConsolidatedHealth, OverallStatus, ServiceKey, ServiceResult, ServiceStatus};
