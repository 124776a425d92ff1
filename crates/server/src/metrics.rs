//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the sieve server:
//! - HTTP request metrics (latency, counts, errors)
//! - Pending torrents by status and orchestrator state (collected dynamically)
//! - Core metrics (sweeps, transitions, fast path, client calls)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use sieve_core::PendingStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sieve_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sieve_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sieve_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pending Torrent Metrics (collected dynamically)
// =============================================================================

/// Pending torrents by current status.
pub static PENDING_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("sieve_pending_by_status", "Current pending torrent count by status"),
        &["status"],
    )
    .unwrap()
});

/// Non-terminal rows older than the stuck threshold.
pub static PENDING_STUCK: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sieve_pending_stuck",
        "Non-terminal pending torrents older than the stuck threshold",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sieve_orchestrator_running",
        "Whether the background loops are running (1) or stopped (0)",
    )
    .unwrap()
});

/// Deferred filtering tasks in flight.
pub static DELAYED_TASKS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sieve_delayed_tasks_active",
        "Number of deferred filtering tasks in flight",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Pending torrents
    registry
        .register(Box::new(PENDING_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(PENDING_STUCK.clone())).unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(DELAYED_TASKS_ACTIVE.clone()))
        .unwrap();

    // Core metrics (sweeps, lifecycle, torrent client)
    for metric in sieve_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the store and the
/// orchestrator right now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();

    let status = orchestrator.status();
    ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
    DELAYED_TASKS_ACTIVE.set(status.delayed_tasks as i64);

    if let Ok(stats) = orchestrator.statistics() {
        for pending_status in PendingStatus::ALL {
            PENDING_BY_STATUS
                .with_label_values(&[pending_status.as_str()])
                .set(stats.count_for(pending_status) as i64);
        }
        PENDING_STUCK.set(stats.stuck as i64);
    }
}

/// Normalize a path for metric labels (replace hashes with placeholders).
pub fn normalize_path(path: &str) -> String {
    // Info hashes: 40 hex (v1) or 64 hex (v2)
    let hash_regex = regex_lite::Regex::new(r"\b(?:[0-9a-fA-F]{64}|[0-9a-fA-F]{40})\b").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = hash_regex.replace_all(path, "{hash}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_hash() {
        let path = "/api/v1/pending/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        assert_eq!(normalize_path(path), "/api/v1/pending/{hash}");
    }

    #[test]
    fn test_normalize_path_hash_with_action() {
        let path = "/api/v1/pending/A94A8FE5CCB19BA61C4C0873D391E987982FBBD3/retry";
        assert_eq!(normalize_path(path), "/api/v1/pending/{hash}/retry");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/pending/stats"), "/api/v1/pending/stats");
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("sieve_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs metrics that have been touched
        PENDING_BY_STATUS.with_label_values(&["completed"]).set(0);
        ORCHESTRATOR_RUNNING.set(0);
        sieve_core::metrics::SWEEPS_TOTAL.inc();

        let output = encode_metrics();

        assert!(output.contains("sieve_pending_by_status"));
        assert!(output.contains("sieve_orchestrator_running"));
        assert!(output.contains("sieve_sweeps_total"));
    }
}
