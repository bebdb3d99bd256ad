//! Request metrics layer.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Keeps the in-flight gauge balanced even when the handler future is dropped.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        HTTP_REQUESTS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HTTP_REQUESTS_IN_FLIGHT.dec();
    }
}

/// Label for a request: the route template when one matched, otherwise the
/// raw path with ids collapsed.
fn route_label(request: &Request<Body>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(request.uri().path()),
    }
}

/// Records latency, count and in-flight requests per method, route and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let route = route_label(&request);
    let started = Instant::now();

    let response = {
        let _in_flight = InFlight::enter();
        next.run(request).await
    };

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), route.as_str(), status.as_str()];
    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(started.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "OK"
    }

    fn counted(route: &str, status: &str) -> u64 {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", route, status])
            .get()
    }

    #[tokio::test]
    async fn test_matched_route_is_used_as_label() {
        let app = Router::new()
            .route("/jobs/{id}/preview", get(ok))
            .layer(middleware::from_fn(metrics_middleware));

        let before = counted("/jobs/{id}/preview", "200");
        let request = Request::builder()
            .uri("/jobs/550e8400-e29b-41d4-a716-446655440000/preview")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(counted("/jobs/{id}/preview", "200"), before + 1);
    }

    #[tokio::test]
    async fn test_unmatched_path_is_normalized() {
        let app = Router::new()
            .route("/health", get(ok))
            .layer(middleware::from_fn(metrics_middleware));

        let before = counted("/nowhere/{id}", "404");
        let request = Request::builder()
            .uri("/nowhere/123e4567-e89b-12d3-a456-426614174000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(counted("/nowhere/{id}", "404"), before + 1);
    }
}
