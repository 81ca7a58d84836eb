//! Route definitions for the `/progress` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;

/// Routes mounted at `/progress`.
///
/// ```text
/// POST   /                -> publish_progress
/// GET    /events          -> list_events (?since=)
/// GET    /stats           -> get_stats
/// GET    /jobs            -> list_jobs
/// GET    /jobs/{job_id}   -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(progress::publish_progress))
        .route("/events", get(progress::list_events))
        .route("/stats", get(progress::get_stats))
        .route("/jobs", get(progress::list_jobs))
        .route("/jobs/{job_id}", get(progress::get_job))
}
