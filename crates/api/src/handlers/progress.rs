//! Handlers for the `/progress` resource.
//!
//! Producers post updates here; the hub stamps, coalesces and fans them
//! out to WebSocket subscribers. The read endpoints expose the replay
//! buffer and the server-side job board.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pictopy_core::error::CoreError;
use pictopy_core::progress::{ProgressMessage, ProgressUpdate};
use pictopy_core::reconcile::Job;
use pictopy_events::HubStats;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::query::SinceParams;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::manager::ConnectionInfo;

/// Body returned by a successful publish.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub job_id: String,
}

/// Hub counters plus the live subscriber list.
#[derive(Debug, Serialize)]
pub struct ProgressStats {
    #[serde(flatten)]
    pub hub: HubStats,
    pub connections: Vec<ConnectionInfo>,
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

/// POST /api/v1/progress
///
/// Queue a progress update. Returns 202: delivery to subscribers happens
/// asynchronously and may be coalesced. 400 on an invalid update, 503 when
/// the hub queue is full.
pub async fn publish_progress(
    State(state): State<AppState>,
    Json(update): Json<ProgressUpdate>,
) -> AppResult<impl IntoResponse> {
    update.validate()?;

    let job_id = update.job_id().unwrap_or_default().to_string();
    state.hub.publish(update)?;

    tracing::debug!(job_id = %job_id, "Progress update queued");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: Accepted { job_id } })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/progress/events?since=<seq>
///
/// Buffered events with `seq > since`, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<SinceParams>,
) -> Json<DataResponse<Vec<ProgressMessage>>> {
    let events = state.hub.events_since(params.since).await;
    Json(DataResponse { data: events })
}

/// GET /api/v1/progress/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<DataResponse<ProgressStats>> {
    let hub = state.hub.stats().await;
    let connections = state.ws_manager.connection_info().await;
    Json(DataResponse {
        data: ProgressStats { hub, connections },
    })
}

/// GET /api/v1/progress/jobs
///
/// Current reconciled state of every job the hub has emitted, sorted by id.
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<Vec<Job>>> {
    Json(DataResponse {
        data: state.hub.jobs().await,
    })
}

/// GET /api/v1/progress/jobs/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state
        .hub
        .job(&job_id)
        .await
        .ok_or(AppError::Core(CoreError::JobNotFound(job_id)))?;
    Ok(Json(DataResponse { data: job }))
}
