//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PollerConfig (validated, immutable)
//!     → engine, environment adapter, admin surface, observability
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs (a services list)
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerConfig, EnvironmentConfig, LatencyConfig, LogFormat,
    ObservabilityConfig, PollerConfig, PollingConfig, RetryConfig, ServiceConfig, TimeoutConfig,
};
