//! Single-shot conversion endpoint.
//!
//! `POST /convert` takes one multipart `image` field and answers with the MP4
//! bytes directly. Nothing is registered in the session; the request only
//! shares the engine (and its one-conversion-at-a-time rule) with batch runs.
//! Failures are plain text, unlike the rest of the API.

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::sync::Arc;
use stillreel_core::{orchestrator::normalize_duration, IncomingFile, OUTPUT_CONTENT_TYPE};
use tracing::{debug, info, warn};

use crate::state::AppState;

const IMAGE_FIELD: &str = "image";
const DURATION_FIELD: &str = "duration";

/// Name used in messages when the client sent no file name.
const UNNAMED_IMAGE: &str = "image";

pub async fn convert(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut image: Option<IncomingFile> = None;
    let mut duration: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return plain_text(e.status(), e.body_text()),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            IMAGE_FIELD => {
                let file_name = field
                    .file_name()
                    .unwrap_or(UNNAMED_IMAGE)
                    .to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => image = Some(IncomingFile::new(file_name, content_type, bytes)),
                    Err(e) => {
                        return plain_text(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read image: {}", e),
                        )
                    }
                }
            }
            DURATION_FIELD => match field.text().await {
                Ok(text) if !text.trim().is_empty() => duration = Some(text),
                Ok(_) => {}
                Err(e) => {
                    return plain_text(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read duration: {}", e),
                    )
                }
            },
            other => debug!(field = other, "Ignoring multipart field"),
        }
    }

    let Some(image) = image else {
        return plain_text(
            StatusCode::BAD_REQUEST,
            format!("Missing multipart field '{}'", IMAGE_FIELD),
        );
    };

    if let Err(e) = state.intake().validate(&image) {
        warn!(file = %image.file_name, error = %e, "Rejected single-shot image");
        return plain_text(StatusCode::BAD_REQUEST, e.to_string());
    }

    let duration_secs = match resolve_duration(&state, duration.as_deref()) {
        Ok(secs) => secs,
        Err(message) => return plain_text(StatusCode::BAD_REQUEST, message),
    };

    info!(
        file = %image.file_name,
        size = image.bytes.len(),
        duration_secs,
        "Single-shot conversion requested"
    );

    let params = state.engine().params(duration_secs);
    match state.engine().convert(image.bytes, &params, None).await {
        Ok(output) => {
            info!(
                output_size = output.bytes.len(),
                elapsed_ms = output.elapsed_ms,
                "Single-shot conversion finished"
            );
            video_response(output.bytes)
        }
        Err(failure) => {
            warn!(cause = %failure.cause, "Single-shot conversion failed");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
        }
    }
}

/// The configured duration, or the request's `duration` field when overrides
/// are allowed.
fn resolve_duration(state: &AppState, requested: Option<&str>) -> Result<f64, String> {
    let config = &state.config().single_shot;
    let Some(raw) = requested else {
        return Ok(config.duration_secs);
    };

    if !config.allow_duration_override {
        debug!(requested = raw, "Duration override disabled, using configured duration");
        return Ok(config.duration_secs);
    }

    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("Invalid duration: {}", raw.trim()))?;
    normalize_duration(secs).map_err(|e| e.to_string())
}

fn video_response(bytes: Bytes) -> Response {
    (
        [(header::CONTENT_TYPE, OUTPUT_CONTENT_TYPE)],
        Body::from(bytes),
    )
        .into_response()
}

fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}
