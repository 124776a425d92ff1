//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sweeps (runs, duration, per-row outcomes)
//! - Pending torrent status transitions
//! - Fast path and deferred filtering outcomes
//! - Torrent client calls

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Sweep Metrics
// =============================================================================

/// Sweeps run.
pub static SWEEPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sieve_sweeps_total", "Total reconciliation sweeps run").unwrap()
});

/// Sweep duration in seconds.
pub static SWEEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("sieve_sweep_duration_seconds", "Duration of a sweep")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &[],
    )
    .unwrap()
});

/// Rows handled by sweeps, by outcome.
pub static SWEEP_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sieve_sweep_rows_total", "Rows processed by sweeps"),
        &["outcome"], // "completed", "failed", "timed_out", "waiting", "recovered", "error"
    )
    .unwrap()
});

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Status transitions that won their compare-and-set.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sieve_status_transitions_total",
            "Pending torrent status transitions",
        ),
        &["to_status"],
    )
    .unwrap()
});

/// Fast path submissions by outcome.
pub static FAST_PATH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sieve_fast_path_total", "Fast path submissions"),
        &["outcome"], // completed, rejected, failed, deferred, duplicate, superseded, submit_failed
    )
    .unwrap()
});

/// Deferred filtering tasks by how they ended.
pub static DELAYED_TASKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sieve_delayed_tasks_total", "Deferred filtering tasks"),
        &["result"], // "filtered", "superseded", "exhausted", "cancelled"
    )
    .unwrap()
});

/// Terminal rows purged by cleanup.
pub static CLEANUP_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sieve_cleanup_deleted_total",
        "Terminal rows deleted by cleanup",
    )
    .unwrap()
});

// =============================================================================
// Torrent Client Metrics
// =============================================================================

/// Torrent client call duration.
pub static CLIENT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sieve_client_request_duration_seconds",
            "Duration of torrent client calls",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),
        &["operation"],
    )
    .unwrap()
});

/// Torrent client calls total.
pub static CLIENT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sieve_client_requests_total", "Total torrent client calls"),
        &["operation", "status"], // status: "success", "error", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Sweeps
        Box::new(SWEEPS_TOTAL.clone()),
        Box::new(SWEEP_DURATION.clone()),
        Box::new(SWEEP_ROWS.clone()),
        // Lifecycle
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(FAST_PATH_OUTCOMES.clone()),
        Box::new(DELAYED_TASKS.clone()),
        Box::new(CLEANUP_DELETED.clone()),
        // Torrent client
        Box::new(CLIENT_DURATION.clone()),
        Box::new(CLIENT_REQUESTS.clone()),
    ]
}
