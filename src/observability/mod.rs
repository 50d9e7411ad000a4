//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Poller, circuit breakers, store:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metric updates are no-ops until a recorder is installed
//! - Service key is the only per-series label besides status/reason

pub mod logging;
pub mod metrics;
