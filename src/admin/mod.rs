//! Admin HTTP surface.
//!
//! Exposes the consolidated snapshot, circuit state, refresh triggers, and
//! host events over a small bearer-token protected API.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::environment::HostEnvironment;
use crate::health::HealthEngine;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<HealthEngine>,
    pub environment: Arc<HostEnvironment>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(engine: Arc<HealthEngine>, environment: Arc<HostEnvironment>, api_key: &str) -> Self {
        Self {
            engine,
            environment,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/refresh", post(refresh_all))
        .route("/admin/refresh/{service}", post(refresh_service))
        .route("/admin/environment", post(post_environment))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
