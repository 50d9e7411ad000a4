//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Schedulers stop arming timers → Admin server drains → Exit
//! ```
//!
//! # Design Decisions
//! - A single broadcast fans the shutdown out to every long-running task
//! - In-flight probes are not cancelled; their late results are discarded
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
