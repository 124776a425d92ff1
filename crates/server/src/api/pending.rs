//! Pending torrent API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sieve_core::pending::{PendingError, UnknownVariant};
use sieve_core::{
    OrchestratorError, PendingPage, PendingQuery, PendingStats, PendingStatus, PendingTorrent,
    SubmitOutcome, SubmitRequest, SweepReport,
};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Query parameters for listing pending torrents
#[derive(Debug, Deserialize)]
pub struct ListPendingParams {
    /// Filter by status (snake_case)
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePendingParams {
    /// Also delete downloaded data. Defaults to true.
    pub delete_files: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    /// Overrides the configured retention.
    pub retention_days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: usize,
    pub retention_days: u32,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct PendingErrorResponse {
    pub error: String,
}

/// Orchestrator error mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        let status = match &e {
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::InvalidState { .. } => StatusCode::CONFLICT,
            OrchestratorError::InvalidMagnet(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::Store(PendingError::NotFound(_)) => StatusCode::NOT_FOUND,
            OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrchestratorError::TorrentClient(_) => StatusCode::BAD_GATEWAY,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(PendingErrorResponse { error: self.1 })).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Rows are keyed by lowercase info-hash.
fn normalize_hash(hash: &str) -> String {
    hash.trim().to_lowercase()
}

/// Submit a magnet for filtered download.
///
/// Returns 200 with the outcome whenever the torrent reached the client,
/// including rejections. A failed hand-off to the client is a 502.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitOutcome>), ApiError> {
    let outcome = state
        .orchestrator()
        .submit_for_filtered_download(body)
        .await?;

    let status = if !outcome.success && outcome.status.is_none() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPendingParams>,
) -> Result<Json<PendingPage>, ApiError> {
    let mut query = PendingQuery::default();

    if let Some(ref raw) = params.status {
        let status: PendingStatus = raw
            .parse()
            .map_err(|e: UnknownVariant| ApiError::bad_request(e.to_string()))?;
        query = query.with_status(status);
    }
    if params.page.is_some() || params.page_size.is_some() {
        let page = params.page.unwrap_or(query.page);
        let page_size = params.page_size.unwrap_or(query.page_size);
        query = query.with_page(page, page_size);
    }

    Ok(Json(state.orchestrator().list_pending(&query)?))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<PendingStats>, ApiError> {
    Ok(Json(state.orchestrator().statistics()?))
}

pub async fn get_pending(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<PendingTorrent>, ApiError> {
    Ok(Json(state.orchestrator().get_pending(&normalize_hash(&hash))?))
}

/// Remove the torrent from the client and drop its row.
pub async fn delete_pending(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(params): Query<DeletePendingParams>,
) -> Result<Json<PendingTorrent>, ApiError> {
    let delete_files = params.delete_files.unwrap_or(true);
    Ok(Json(
        state
            .orchestrator()
            .delete_pending(&normalize_hash(&hash), delete_files)
            .await?,
    ))
}

pub async fn retry(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<PendingTorrent>, ApiError> {
    Ok(Json(state.orchestrator().retry(&normalize_hash(&hash)).await?))
}

/// Run one sweep now instead of waiting for the loop.
pub async fn sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    Json(state.orchestrator().run_periodic_sweep().await)
}

pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let retention_days = params
        .retention_days
        .unwrap_or(state.config().orchestrator.retention_days);

    let deleted = state.orchestrator().cleanup_old(retention_days)?;
    Ok(Json(CleanupResponse {
        deleted,
        retention_days,
    }))
}
