use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of open progress subscriptions.
    pub ws_connections: usize,
    /// Last sequence number the hub assigned.
    pub last_seq: u64,
}

/// GET /health -- returns service status and hub counters.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws_connections = state.ws_manager.connection_count().await;
    let last_seq = state.hub.stats().await.last_seq;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ws_connections,
        last_seq,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
