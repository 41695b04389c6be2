//! Health check and index endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub message: String,
}

/// GET / - Liveness banner
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "PaddyScannerAI API is running.".to_string(),
    })
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: crate::VERSION.to_string(),
    })
}
