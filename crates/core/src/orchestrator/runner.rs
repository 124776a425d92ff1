//! Filter orchestrator implementation.
//!
//! Owns the background activities that move pending torrents along:
//! - Sweep: periodic reconciliation of every non-terminal row
//! - Cleanup: daily purge of old finished rows
//! - Delayed tasks: short-lived retries started by the fast path

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::filter::{FilterConfig, FilterConfigHandle};
use crate::pending::{PendingPage, PendingQuery, PendingStats, PendingStore, PendingTorrent};
use crate::torrent_client::TorrentClient;

use super::config::OrchestratorConfig;
use super::context::Context;
use super::delayed::DelayedPool;
use super::types::{OrchestratorError, OrchestratorStatus, SubmitOutcome, SubmitRequest, SweepReport};

/// The filter orchestrator - resolves metadata and filters torrent files.
pub struct FilterOrchestrator {
    ctx: Context,
    delayed: Arc<DelayedPool>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FilterOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn PendingStore>,
        client: Arc<dyn TorrentClient>,
        filter: FilterConfigHandle,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            ctx: Context {
                config: Arc::new(config),
                store,
                client,
                filter,
            },
            delayed: Arc::new(DelayedPool::new(shutdown_tx.clone())),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the orchestrator (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            sweep_interval_ms = self.ctx.config.sweep_interval_ms,
            cleanup_interval_secs = self.ctx.config.cleanup_interval_secs,
            "Starting filter orchestrator"
        );

        self.spawn_sweep_loop();
        self.spawn_cleanup_loop();

        info!("Filter orchestrator started");
    }

    /// Stop the orchestrator gracefully, cancelling delayed tasks and
    /// waiting for them to finish.
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        info!(was_running, "Stopping filter orchestrator");

        // Signal shutdown to loops and delayed tasks
        let _ = self.shutdown_tx.send(());
        self.delayed.drain().await;

        info!("Filter orchestrator stopped");
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            delayed_tasks: self.delayed.len(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.ctx.config
    }

    /// Add a magnet paused, filter it if its metadata shows up within the
    /// fast-path wait, otherwise let it download and filter later.
    pub async fn submit_for_filtered_download(
        &self,
        request: SubmitRequest,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        self.ctx.submit(request, &self.delayed).await
    }

    /// Run one reconciliation sweep now.
    pub async fn run_periodic_sweep(&self) -> SweepReport {
        self.ctx.sweep().await
    }

    /// Scheduled cleanup entry point.
    pub fn run_daily_cleanup(&self, retention_days: u32) -> Result<usize, OrchestratorError> {
        info!(retention_days, "Running pending torrent cleanup");
        self.cleanup_old(retention_days)
    }

    pub fn cleanup_old(&self, retention_days: u32) -> Result<usize, OrchestratorError> {
        self.ctx.cleanup_old(retention_days)
    }

    pub async fn retry(&self, hash: &str) -> Result<PendingTorrent, OrchestratorError> {
        self.ctx.retry(hash).await
    }

    pub async fn delete_pending(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<PendingTorrent, OrchestratorError> {
        self.ctx.delete_pending(hash, delete_files).await
    }

    pub fn get_pending(&self, hash: &str) -> Result<PendingTorrent, OrchestratorError> {
        self.ctx.get_pending(hash)
    }

    pub fn list_pending(&self, query: &PendingQuery) -> Result<PendingPage, OrchestratorError> {
        self.ctx.list_pending(query)
    }

    pub fn statistics(&self) -> Result<PendingStats, OrchestratorError> {
        self.ctx.statistics()
    }

    /// Rules new filtering passes will use.
    pub fn filter_config(&self) -> FilterConfig {
        self.ctx.filter.current()
    }

    /// Swap the filter rules. Attempts already past file selection keep the
    /// rules they started with.
    pub fn set_filter_config(&self, config: FilterConfig) {
        info!(
            media_files_only = config.media_files_only,
            min_file_size_mb = config.min_file_size_mb,
            "Filter configuration updated"
        );
        self.ctx.filter.replace(config);
    }

    fn spawn_sweep_loop(&self) {
        let running = Arc::clone(&self.running);
        let ctx = self.ctx.clone();
        let interval = Duration::from_millis(ctx.config.sweep_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Sweep loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        ctx.sweep().await;
                    }
                }
            }
            info!("Sweep loop stopped");
        });
    }

    fn spawn_cleanup_loop(&self) {
        let running = Arc::clone(&self.running);
        let ctx = self.ctx.clone();
        let interval = Duration::from_secs(ctx.config.cleanup_interval_secs);
        let retention_days = ctx.config.retention_days;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Cleanup loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cleanup loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = ctx.cleanup_old(retention_days) {
                            error!(error = %e, "Pending torrent cleanup failed");
                        }
                    }
                }
            }
            info!("Cleanup loop stopped");
        });
    }
}
