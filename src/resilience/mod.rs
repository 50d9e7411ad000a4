//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe to service:
//!     → timeouts.rs (abort the attempt at the adaptive deadline)
//!     → On transient failure: retries.rs (retry with backoff.rs delays)
//!     → circuit_breaker.rs (track failures, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every network call has a deadline
//! - Retries only for transient errors (timeouts, network, 5xx)
//! - One breaker per service, shared by every consumer

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;
