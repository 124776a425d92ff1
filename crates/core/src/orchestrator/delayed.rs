//! Deferred filtering after the fast path gave up waiting.
//!
//! Each task re-checks one torrent a bounded number of times. The sweep
//! stays the backstop, so a task that runs out of attempts just ends.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::pending::{PendingStatus, StatusUpdate};

use super::context::Context;
use super::types::ApplyOutcome;

/// Bounded background tasks, cancelled by the orchestrator's shutdown signal.
pub(crate) struct DelayedPool {
    tasks: Mutex<JoinSet<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DelayedPool {
    pub(crate) fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            shutdown_tx,
        }
    }

    /// Schedule deferred filtering for a torrent.
    pub(crate) fn submit(&self, ctx: Context, hash: String) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let Ok(mut tasks) = self.tasks.lock() else {
            warn!(hash = %hash, "Delayed task pool unavailable, leaving torrent to the sweep");
            return;
        };
        while tasks.try_join_next().is_some() {}

        debug!(hash = %hash, "Scheduling delayed filter task");
        tasks.spawn(async move {
            let result = tokio::select! {
                _ = shutdown_rx.recv() => "cancelled",
                result = run_delayed(&ctx, &hash) => result,
            };
            metrics::DELAYED_TASKS.with_label_values(&[result]).inc();
            debug!(hash = %hash, result, "Delayed filter task ended");
        });
    }

    /// Tasks still in flight.
    pub(crate) fn len(&self) -> usize {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                while tasks.try_join_next().is_some() {}
                tasks.len()
            }
            Err(_) => 0,
        }
    }

    /// Wait for every task to finish. Call after signalling shutdown.
    pub(crate) async fn drain(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => return,
        };

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(error = %e, "Delayed filter task panicked");
                }
            }
        }
    }
}

async fn run_delayed(ctx: &Context, hash: &str) -> &'static str {
    let interval = Duration::from_millis(ctx.config.delayed_interval_ms);

    for attempt in 1..=ctx.config.delayed_attempts {
        tokio::time::sleep(interval).await;

        let status = match ctx.store.get(hash) {
            Ok(Some(row)) => row.status,
            Ok(None) => return "superseded",
            Err(e) => {
                warn!(hash = %hash, error = %e, "Failed to load pending torrent");
                continue;
            }
        };
        if !matches!(
            status,
            PendingStatus::WaitingMetadata | PendingStatus::MetadataReady
        ) {
            return "superseded";
        }

        let files = match ctx.call("get_files", ctx.client.get_files(hash)).await {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                debug!(hash = %hash, attempt, "Metadata still unresolved");
                continue;
            }
            Err(e) if e.is_not_found() => return "superseded",
            Err(e) => {
                debug!(hash = %hash, attempt, error = %e, "File list unavailable");
                continue;
            }
        };

        let total_size: u64 = files.iter().map(|f| f.size).sum();
        if let Err(e) = ctx.transition(
            hash,
            &[PendingStatus::WaitingMetadata],
            StatusUpdate::to(PendingStatus::MetadataReady).with_total_size(total_size),
        ) {
            warn!(hash = %hash, error = %e, "Failed to mark metadata ready");
            continue;
        }

        // Downloading unfiltered since the fast path resumed it
        match ctx.apply_paused(hash, Some(files)).await {
            Ok(ApplyOutcome::Deferred(_)) => continue,
            Ok(ApplyOutcome::AlreadyHandled) => return "superseded",
            Ok(_) => {
                info!(hash = %hash, attempt, "Delayed filter applied");
                return "filtered";
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "Delayed filter attempt failed");
            }
        }
    }

    info!(hash = %hash, "Delayed filter attempts exhausted, leaving torrent to the sweep");
    "exhausted"
}
