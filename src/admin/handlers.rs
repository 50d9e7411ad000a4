use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::environment::{EnvironmentPatch, EnvironmentState};
use crate::health::scheduler::ForcedPoll;
use crate::health::types::{ConsolidatedHealth, OverallStatus, ServiceKey};
use crate::health::EngineError;
use crate::resilience::circuit_breaker::CircuitState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub overall_status: OverallStatus,
    pub summary: &'static str,
    pub services: usize,
    pub is_polling: bool,
    pub is_visible: bool,
}

#[derive(Debug, Serialize)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_age_ms: Option<u64>,
    pub average_latency_ms: Option<f64>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.engine.get_snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        overall_status: snapshot.overall_status,
        summary: snapshot.overall_status.summary(),
        services: snapshot.services.len(),
        is_polling: snapshot.metadata.is_polling,
        is_visible: snapshot.metadata.is_visible,
    })
}

pub async fn get_health(State(state): State<AdminState>) -> Json<ConsolidatedHealth> {
    Json(ConsolidatedHealth::clone(&state.engine.get_snapshot()))
}

pub async fn get_circuits(State(state): State<AdminState>) -> Json<BTreeMap<ServiceKey, CircuitStatus>> {
    let latency = state.engine.registry().latency();
    let circuits = state
        .engine
        .circuits()
        .into_iter()
        .map(|(key, snapshot)| {
            let status = CircuitStatus {
                state: snapshot.state,
                failure_count: snapshot.failure_count,
                last_failure_age_ms: snapshot.last_failure_age_ms,
                average_latency_ms: latency.average_latency(&key),
            };
            (key, status)
        })
        .collect();
    Json(circuits)
}

pub async fn refresh_all(State(state): State<AdminState>) -> Json<BTreeMap<ServiceKey, ForcedPoll>> {
    Json(state.engine.refresh_all())
}

pub async fn refresh_service(
    State(state): State<AdminState>,
    Path(service): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let key = ServiceKey::new(service);
    match state.engine.refresh(&key) {
        Ok(result) => Ok(Json(serde_json::json!({ "service": key, "result": result }))),
        Err(EngineError::UnknownService(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(service = %key, error = %e, "Refresh failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn post_environment(
    State(state): State<AdminState>,
    Json(patch): Json<EnvironmentPatch>,
) -> Json<EnvironmentState> {
    Json(state.environment.apply(patch))
}
