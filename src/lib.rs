//! Adaptive Health Polling Engine Library

pub mod config;
pub mod environment;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod admin;

pub use config::schema::PollerConfig;
pub use health::HealthEngine;
pub use lifecycle::Shutdown;
