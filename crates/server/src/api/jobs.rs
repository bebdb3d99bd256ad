//! Job API handlers: intake, listing, preview, download and release.

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use stillreel_core::{
    registry::StatusCounts, ClearReport, DownloadEntry, IncomingFile, IntakeReport, Job, JobId,
    ResultError,
};
use tracing::{debug, warn};

use super::handlers::ErrorResponse;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize)]
pub struct RemoveJobResponse {
    pub job_id: JobId,
    pub released_bytes: u64,
}

/// Completed clips plus the delay a client waits between saving each one.
#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub interval_ms: u64,
    pub downloads: Vec<DownloadEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept any number of uploaded files. Every field carrying a file name is
/// treated as a file; other fields are ignored.
///
/// Responds 201 when at least one job was created, 200 when every file was
/// rejected.
pub async fn upload_jobs(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IntakeReport>), ApiError> {
    let mut files = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(ErrorResponse::with_status(e.status(), e.body_text())),
        };

        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            debug!(field = ?field.name(), "Ignoring non-file multipart field");
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(|e| {
            ErrorResponse::with_status(
                StatusCode::BAD_REQUEST,
                format!("Failed to read {}: {}", file_name, e),
            )
        })?;

        files.push(IncomingFile::new(file_name, content_type, bytes));
    }

    if files.is_empty() {
        return Err(ErrorResponse::with_status(
            StatusCode::BAD_REQUEST,
            "No files provided",
        ));
    }

    let report = state.intake().accept(files);
    let status = if report.accepted.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(report)))
}

/// List jobs in creation order.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    let registry = state.session().registry();
    Json(ListJobsResponse {
        jobs: registry.list(),
        counts: registry.counts(),
    })
}

/// Remove every job and release every stored byte.
pub async fn clear_jobs(State(state): State<Arc<AppState>>) -> Json<ClearReport> {
    let report = state.results().clear_all_and_release();
    if !report.failures.is_empty() {
        warn!(failures = report.failures.len(), "Clear finished with failures");
    }
    Json(report)
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = parse_job_id(&id)?;
    state
        .session()
        .registry()
        .get(id)
        .map(Json)
        .ok_or_else(|| result_error(ResultError::NotFound(id)))
}

/// Remove one job and release its bytes.
pub async fn remove_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RemoveJobResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    let released_bytes = state.results().remove_and_release(id).map_err(result_error)?;
    Ok(Json(RemoveJobResponse {
        job_id: id,
        released_bytes,
    }))
}

/// The source image, for display before the clip exists.
pub async fn get_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&id)?;
    let preview = state.results().get_preview(id).map_err(result_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, preview.content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Body::from(preview.bytes),
    )
        .into_response())
}

/// The finished clip as an attachment named after the source image.
pub async fn download_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&id)?;
    let download = state.results().get_downloadable(id).map_err(result_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, download.content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&download.file_name),
            ),
        ],
        Body::from(download.bytes),
    )
        .into_response())
}

/// Completed jobs for a bulk download.
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<DownloadsResponse> {
    Json(DownloadsResponse {
        interval_ms: state.config().batch.bulk_download_interval_ms,
        downloads: state.results().downloadables(),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| {
        ErrorResponse::with_status(StatusCode::BAD_REQUEST, format!("Invalid job id: {}", raw))
    })
}

fn result_error(err: ResultError) -> ApiError {
    let status = match &err {
        ResultError::NotFound(_) => StatusCode::NOT_FOUND,
        ResultError::NotReady { .. } => StatusCode::CONFLICT,
        ResultError::Registry(_) | ResultError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ErrorResponse::with_status(status, err)
}

/// Attachment header with an ASCII fallback and the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("beach.mp4"),
            "attachment; filename=\"beach.mp4\"; filename*=UTF-8''beach.mp4"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("café \"1\".mp4");
        assert!(value.starts_with("attachment; filename=\"caf_ _1_.mp4\""));
        assert!(value.ends_with("filename*=UTF-8''caf%C3%A9%20%221%22.mp4"));
    }

    #[test]
    fn test_parse_job_id_rejects_garbage() {
        let (status, body) = parse_job_id("not-a-uuid").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("not-a-uuid"));
    }

    #[test]
    fn test_result_error_status_mapping() {
        let id = JobId::new();
        assert_eq!(result_error(ResultError::NotFound(id)).0, StatusCode::NOT_FOUND);
        assert_eq!(
            result_error(ResultError::NotReady {
                job_id: id,
                status: stillreel_core::JobStatus::Processing,
            })
            .0,
            StatusCode::CONFLICT
        );
    }
}
