pub mod health;
pub mod progress;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /progress                        publish (POST)
/// /progress/events                 replay buffer (?since=)
/// /progress/stats                  hub counters and subscribers
/// /progress/jobs                   job board
/// /progress/jobs/{job_id}          single job
/// ```
///
/// The WebSocket stream lives at the root (`/ws`), see [`crate::app`].
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/progress", progress::router())
}
