//! `GET /health`, `GET /metrics`: unauthenticated liveness and metrics probes.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Body of the `/health` response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `/metrics`: raw Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<ApiState>>) -> Result<String, ApiError> {
    state
        .telemetry
        .render()
        .map_err(|err| ApiError::internal(err.to_string()))
}
