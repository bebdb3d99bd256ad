use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use stillreel_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    /// Whether the codec engine has been initialized.
    pub engine_ready: bool,
    pub engine_busy: bool,
}

/// Common error body for every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn with_status(status: StatusCode, error: impl ToString) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                error: error.to_string(),
            }),
        )
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.engine();
    Json(HealthResponse {
        status: "ok".to_string(),
        engine: engine.engine_name().to_string(),
        engine_ready: engine.is_ready(),
        engine_busy: engine.is_busy(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        encode_metrics(),
    )
}
