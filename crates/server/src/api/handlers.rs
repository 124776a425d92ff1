use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use sieve_core::{FilterConfig, SanitizedConfig};
use sieve_core::orchestrator::OrchestratorStatus;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ConfigErrorResponse {
    pub error: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn get_filter_config(State(state): State<Arc<AppState>>) -> Json<FilterConfig> {
    Json(state.orchestrator().filter_config())
}

/// Replace the filter rules used by subsequent filtering passes.
pub async fn put_filter_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FilterConfig>,
) -> Result<Json<FilterConfig>, impl IntoResponse> {
    if let Some(max) = body.max_file_size_mb {
        if body.min_file_size_mb > max {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ConfigErrorResponse {
                    error: "min_file_size_mb cannot exceed max_file_size_mb".to_string(),
                }),
            ));
        }
    }

    state.orchestrator().set_filter_config(body);
    Ok(Json(state.orchestrator().filter_config()))
}

pub async fn orchestrator_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status())
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [("content-type", "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
