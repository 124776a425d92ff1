//! HTTP API tests for the pending torrent endpoints.
//!
//! Each test builds the router over a file-backed SQLite store and a
//! scripted torrent client, then drives it with in-process requests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};
use sieve_core::testing::MockOperation;
use sieve_core::{PendingStatus, PendingStore, TorrentClientError};

fn submit_body(hash: &str) -> serde_json::Value {
    json!({
        "magnet": fixtures::magnet(hash),
        "save_path": "/downloads",
        "num": "ABC-123",
        "source": "subscribe",
    })
}

// =============================================================================
// Health and configuration
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    let qbit = &response.body["torrent_client"]["qbittorrent"];
    assert_eq!(qbit["password_configured"], json!(true));
    assert!(qbit.get("password").is_none());
    assert!(!response.text.contains("hunter2"));
}

#[tokio::test]
async fn test_filter_config_roundtrip_through_api() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/filter-config").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "media_files_only", json!(true));

    let response = fixture
        .put(
            "/api/v1/filter-config",
            json!({ "media_files_only": false, "min_file_size_mb": 100 }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "min_file_size_mb", json!(100));

    // The sanitized config reflects the live rules
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.body["filter"]["min_file_size_mb"], json!(100));
    assert_eq!(response.body["filter"]["media_files_only"], json!(false));
}

#[tokio::test]
async fn test_filter_config_rejects_inverted_bounds() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put(
            "/api/v1/filter-config",
            json!({ "min_file_size_mb": 500, "max_file_size_mb": 100 }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(fixture.orchestrator.filter_config().media_files_only);
}

#[tokio::test]
async fn test_orchestrator_status() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/orchestrator/status").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "running", json!(false));
    assert_json_path!(response.body, "delayed_tasks", json!(0));
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_filters_immediately() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;

    let response = fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "success", json!(true));
    assert_json_path!(response.body, "status", json!("completed"));
    assert_json_path!(response.body, "file_count_before", json!(4));
    assert_json_path!(response.body, "file_count_after", json!(2));

    let row = fixture.store.get(fixtures::HASH_A).unwrap().unwrap();
    assert_eq!(row.status, PendingStatus::Completed);
    assert_eq!(row.num.as_deref(), Some("ABC-123"));
}

#[tokio::test]
async fn test_submit_rejected_release_is_reported() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_B, fixtures::junk_release(), 0)
        .await;

    let response = fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_B))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "success", json!(false));
    assert_json_path!(response.body, "status", json!("failed"));
    assert!(!fixture.torrent_client.has_torrent(fixtures::HASH_B).await);
}

#[tokio::test]
async fn test_submit_defers_when_metadata_is_slow() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_C))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "success", json!(true));
    assert_json_path!(response.body, "status", json!("waiting_metadata"));

    let status = fixture.get("/api/v1/orchestrator/status").await;
    assert_json_path!(status.body, "delayed_tasks", json!(1));
    fixture.orchestrator.stop().await;
}

#[tokio::test]
async fn test_submit_add_failure_is_bad_gateway() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .fail_operation(
            MockOperation::Add,
            TorrentClientError::ConnectionFailed("connection refused".to_string()),
        )
        .await;

    let response = fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_json_path!(response.body, "success", json!(false));
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .contains("failed to add torrent"));
    assert!(fixture.store.get(fixtures::HASH_A).unwrap().is_none());
}

#[tokio::test]
async fn test_submit_invalid_magnet() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/pending", json!({ "magnet": "not-a-magnet" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("invalid magnet"));
}

#[tokio::test]
async fn test_submit_malformed_json() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/v1/pending", "{ not json").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Listing and lookup
// =============================================================================

#[tokio::test]
async fn test_list_and_filter_by_status() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_B, fixtures::junk_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_B))
        .await;

    let response = fixture.get("/api/v1/pending").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "total", json!(2));
    assert_eq!(response.body["items"].as_array().unwrap().len(), 2);

    let response = fixture.get("/api/v1/pending?status=completed").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "total", json!(1));
    assert_eq!(
        response.body["items"][0]["hash"],
        json!(fixtures::HASH_A)
    );

    let response = fixture.get("/api/v1/pending?page=2&page_size=1").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "page", json!(2));
    assert_eq!(response.body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_unknown_status_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/pending?status=sleeping").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_pending_and_not_found() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture
        .get(&format!("/api/v1/pending/{}", fixtures::HASH_A))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("completed"));
    assert_json_path!(response.body, "source", json!("subscribe"));
    assert_json_path!(response.body["filter_result"], "filtered_file_count", json!(2));

    let response = fixture
        .get(&format!("/api/v1/pending/{}", fixtures::HASH_B))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_path_hash_is_case_insensitive() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;
    let upper = fixtures::HASH_A.to_uppercase();

    let response = fixture.get(&format!("/api/v1/pending/{}", upper)).await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "hash", json!(fixtures::HASH_A));

    // Found, but already completed
    let response = fixture
        .post_empty(&format!("/api/v1/pending/{}/retry", upper))
        .await;
    assert_status!(response, StatusCode::CONFLICT);

    let response = fixture
        .delete(&format!("/api/v1/pending/{}?delete_files=false", upper))
        .await;
    assert_status!(response, StatusCode::OK);
    assert!(fixture.store.get(fixtures::HASH_A).unwrap().is_none());
}

#[tokio::test]
async fn test_stats() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture.get("/api/v1/pending/stats").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "total", json!(1));
    assert_json_path!(response.body, "completed", json!(1));
    assert_json_path!(response.body, "stuck", json!(0));
}

// =============================================================================
// Sweep, retry, delete, cleanup
// =============================================================================

#[tokio::test]
async fn test_sweep_times_out_then_retry_completes() {
    let fixture = TestFixture::with_config(TestConfig::with_max_retries(1)).await;

    let response = fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;
    assert_json_path!(response.body, "status", json!("waiting_metadata"));
    fixture.orchestrator.stop().await;

    let response = fixture.post_empty("/api/v1/pending/sweep").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "timed_out", json!(1));

    let row = fixture.store.get(fixtures::HASH_A).unwrap().unwrap();
    assert_eq!(row.status, PendingStatus::Timeout);
    assert_eq!(fixture.torrent_client.remove_count(fixtures::HASH_A).await, 1);

    // Metadata shows up once the torrent is re-added
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;

    let response = fixture
        .post_empty(&format!("/api/v1/pending/{}/retry", fixtures::HASH_A))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("waiting_metadata"));
    assert_json_path!(response.body, "retry_count", json!(0));

    let response = fixture.post_empty("/api/v1/pending/sweep").await;
    assert_json_path!(response.body, "completed", json!(1));

    let row = fixture.store.get(fixtures::HASH_A).unwrap().unwrap();
    assert_eq!(row.status, PendingStatus::Completed);
}

#[tokio::test]
async fn test_retry_completed_is_conflict() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture
        .post_empty(&format!("/api/v1/pending/{}/retry", fixtures::HASH_A))
        .await;
    assert_status!(response, StatusCode::CONFLICT);

    let response = fixture
        .post_empty(&format!("/api/v1/pending/{}/retry", fixtures::HASH_C))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_pending() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture
        .delete(&format!(
            "/api/v1/pending/{}?delete_files=false",
            fixtures::HASH_A
        ))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "hash", json!(fixtures::HASH_A));

    assert!(fixture.store.get(fixtures::HASH_A).unwrap().is_none());
    assert!(!fixture.torrent_client.has_torrent(fixtures::HASH_A).await);

    let response = fixture
        .delete(&format!("/api/v1/pending/{}", fixtures::HASH_A))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cleanup_keeps_recent_rows() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture.post_empty("/api/v1/pending/cleanup").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "deleted", json!(0));
    assert_json_path!(response.body, "retention_days", json!(7));

    // Zero days purges every finished row
    let response = fixture
        .post_empty("/api/v1/pending/cleanup?retention_days=0")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "deleted", json!(1));
    assert!(fixture.store.get(fixtures::HASH_A).unwrap().is_none());
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture
        .torrent_client
        .script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0)
        .await;
    fixture
        .post("/api/v1/pending", submit_body(fixtures::HASH_A))
        .await;

    let response = fixture.get("/api/v1/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("sieve_pending_by_status"));
    assert!(response.text.contains("sieve_orchestrator_running"));
    assert!(response.text.contains("sieve_http_requests_total"));
}
