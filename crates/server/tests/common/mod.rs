//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router over a real
//! SQLite pending store and a scripted torrent client, so the HTTP surface
//! can be exercised end to end without a qBittorrent instance.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use sieve_core::{
    load_config_from_str, testing::MockTorrentClient, FilterConfigHandle, FilterOrchestrator,
    PendingStore, SqlitePendingStore, TorrentClient,
};
use sieve_server::state::AppState;

/// Re-export fixtures for test convenience
pub use sieve_core::testing::fixtures;

/// Test fixture for API testing with a mock torrent client.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///     fixture.torrent_client.resolve_metadata(fixtures::HASH_A, fixtures::mixed_release()).await;
///
///     let response = fixture.post("/api/v1/pending", json!({
///         "magnet": fixtures::magnet(fixtures::HASH_A),
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock torrent client - script metadata, inspect calls
    pub torrent_client: Arc<MockTorrentClient>,
    /// Pending store shared with the orchestrator
    pub store: Arc<SqlitePendingStore>,
    /// Orchestrator behind the router
    pub orchestrator: Arc<FilterOrchestrator>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        // Short fast-path schedule; delayed tasks stay asleep for the test.
        let mut config = load_config_from_str(&format!(
            r#"
[database]
path = "{}"

[torrent_client.qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "hunter2"

[filter]
media_files_only = {}

[orchestrator]
enabled = false
max_retries = {}
fast_path_wait_ms = [10, 10]
delayed_interval_ms = 600000
"#,
            db_path.display(),
            test_config.media_files_only,
            test_config.max_retries,
        ))
        .expect("Failed to parse test config");
        config.server.port = 0;

        let store = Arc::new(
            SqlitePendingStore::new(&db_path).expect("Failed to create pending store"),
        );
        let torrent_client = Arc::new(MockTorrentClient::new());

        let orchestrator = Arc::new(FilterOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&store) as Arc<dyn PendingStore>,
            Arc::clone(&torrent_client) as Arc<dyn TorrentClient>,
            FilterConfigHandle::new(config.filter.clone()),
        ));

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = sieve_server::api::create_router(state);

        Self {
            router,
            torrent_client,
            store,
            orchestrator,
            temp_dir,
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

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
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

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Keep only video files
    pub media_files_only: bool,
    /// Metadata checks before a row times out
    pub max_retries: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            media_files_only: true,
            max_retries: 10,
        }
    }
}

impl TestConfig {
    /// Create config with a small retry budget for timeout tests.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
