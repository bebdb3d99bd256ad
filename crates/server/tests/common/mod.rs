//! Common test utilities for in-process API testing with a mock engine.
//!
//! This module provides a test fixture that builds the full router around
//! one session whose codec engine is a scriptable `MockEngine`, so every
//! endpoint can be exercised without an ffmpeg binary.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use stillreel_core::{testing::MockEngine, Config, JobId, JobStatus, ServerConfig};
use stillreel_server::api::WsBroadcaster;
use stillreel_server::state::AppState;

/// Re-export fixtures for test convenience
pub use stillreel_core::testing::fixtures;

const BOUNDARY: &str = "stillreel-test-boundary";

/// Test fixture for API testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new();
///
///     let response = fixture
///         .post_multipart("/api/v1/jobs", vec![Part::file("files", "a.jpg", "image/jpeg", bytes)])
///         .await;
///
///     assert_eq!(response.status, StatusCode::CREATED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - script failures, delays and progress
    pub engine: MockEngine,
    /// Shared state behind the router
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, or `Null` when the body is not JSON.
    pub body: Value,
    pub bytes: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One part of a multipart body.
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl Part {
    pub fn file(name: &str, file_name: &str, content_type: &str, data: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            data: data.as_ref().to_vec(),
        }
    }

    /// A file part without a declared media type.
    pub fn untyped_file(name: &str, file_name: &str, data: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: None,
            data: data.as_ref().to_vec(),
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let engine = MockEngine::new();
        let state = Arc::new(AppState::new(
            config,
            Arc::new(engine.clone()),
            WsBroadcaster::default(),
        ));
        let router = stillreel_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            engine,
            state,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with a multipart/form-data body.
    pub async fn post_multipart(&self, path: &str, parts: Vec<Part>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(&parts)))
            .unwrap();
        self.send(request).await
    }

    /// Upload JPEG-signed files and return the created job ids.
    pub async fn upload_jpegs(&self, files: &[(&str, usize)]) -> Vec<JobId> {
        let parts = files
            .iter()
            .map(|(name, size)| Part::file("files", name, "image/jpeg", fixtures::jpeg_bytes(*size)))
            .collect();
        let response = self.post_multipart("/api/v1/jobs", parts).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

        response.body["accepted"]
            .as_array()
            .expect("accepted should be an array")
            .iter()
            .map(|job| {
                job["id"]
                    .as_str()
                    .expect("job id should be a string")
                    .parse()
                    .expect("job id should be a uuid")
            })
            .collect()
    }

    /// Start a batch run over HTTP and wait until it finishes.
    pub async fn run_batch(&self) {
        let response = self.post_empty("/api/v1/batch/run").await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{}", response.text());
        self.wait_until_idle().await;
    }

    pub async fn wait_until_idle(&self) {
        for _ in 0..400 {
            if !self.state.orchestrator().is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("Batch run did not finish in time");
    }

    pub async fn wait_for_processing(&self) -> JobId {
        for _ in 0..400 {
            if let Some(id) = self.state.session().registry().processing() {
                return id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("No job started processing in time");
    }

    pub fn status_of(&self, id: JobId) -> Option<JobStatus> {
        self.state.session().registry().get(id).map(|job| job.status)
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// Default configuration for in-process tests.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0, // Not used for in-process testing
        },
        ..Config::default()
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match &part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status,
            $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            $response.text()
        );
    };
}
