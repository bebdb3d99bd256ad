//! Batch API handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use stillreel_core::{BatchError, BatchStatus};
use tracing::info;

use super::handlers::ErrorResponse;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Request body for changing the batch duration
#[derive(Debug, Deserialize)]
pub struct SetDurationBody {
    /// Seconds; rounded to one decimal.
    pub duration_secs: f64,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<BatchStatus> {
    Json(state.orchestrator().status())
}

/// Set the duration applied to jobs started from now on.
pub async fn set_duration(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetDurationBody>, JsonRejection>,
) -> Result<Json<BatchStatus>, ApiError> {
    let Json(body) = payload
        .map_err(|e| ErrorResponse::with_status(StatusCode::BAD_REQUEST, e.body_text()))?;

    let applied = state
        .orchestrator()
        .set_duration(body.duration_secs)
        .map_err(batch_error)?;
    info!(duration_secs = applied, "Batch duration changed");

    Ok(Json(state.orchestrator().status()))
}

/// Start converting every eligible job in the background.
pub async fn run_all(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<BatchStatus>), ApiError> {
    let orchestrator = state.orchestrator();
    orchestrator.spawn_run_all().map_err(batch_error)?;
    Ok((StatusCode::ACCEPTED, Json(orchestrator.status())))
}

fn batch_error(err: BatchError) -> ApiError {
    let status = match &err {
        BatchError::AlreadyRunning | BatchError::RunInProgress => StatusCode::CONFLICT,
        BatchError::InvalidDuration { .. } => StatusCode::BAD_REQUEST,
    };
    ErrorResponse::with_status(status, err)
}
