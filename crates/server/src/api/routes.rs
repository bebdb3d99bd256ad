use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{batch, convert, handlers, jobs, middleware::metrics_middleware, ws};
use crate::state::AppState;

/// Upper bound for one upload request. Individual files are checked against
/// the intake ceiling, so this only has to leave room for several of them.
const UPLOAD_BODY_LIMIT: usize = 256 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Jobs
        .route(
            "/jobs",
            post(jobs::upload_jobs)
                .get(jobs::list_jobs)
                .delete(jobs::clear_jobs)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::remove_job))
        .route("/jobs/{id}/preview", get(jobs::get_preview))
        .route("/jobs/{id}/download", get(jobs::download_job))
        .route("/downloads", get(jobs::list_downloads))
        // Batch
        .route("/batch", get(batch::get_status))
        .route("/batch/duration", put(batch::set_duration))
        .route("/batch/run", post(batch::run_all))
        // Single-shot conversion
        .route(
            "/convert",
            post(convert::convert).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Real-time updates
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
