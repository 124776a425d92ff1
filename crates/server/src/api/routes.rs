use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, pending};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route(
            "/filter-config",
            get(handlers::get_filter_config).put(handlers::put_filter_config),
        )
        .route("/orchestrator/status", get(handlers::orchestrator_status))
        .route("/metrics", get(handlers::metrics))
        // Pending torrents
        .route("/pending", post(pending::submit).get(pending::list_pending))
        .route("/pending/stats", get(pending::stats))
        .route("/pending/sweep", post(pending::sweep))
        .route("/pending/cleanup", post(pending::cleanup))
        .route(
            "/pending/{hash}",
            get(pending::get_pending).delete(pending::delete_pending),
        )
        .route("/pending/{hash}/retry", post(pending::retry))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
