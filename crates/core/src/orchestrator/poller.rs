//! Metadata poller: the periodic reconciliation sweep.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::pending::{PendingStatus, PendingTorrent, StatusUpdate};

use super::context::Context;
use super::types::{FilterFailure, OrchestratorError, SweepReport};

impl Context {
    /// One metadata check for a WAITING_METADATA row.
    pub(crate) async fn check(&self, row: &PendingTorrent) -> Result<SweepReport, OrchestratorError> {
        let mut report = SweepReport::default();

        let Some(row) = self.store.record_check(&row.hash)? else {
            debug!(hash = %row.hash, "Row left WAITING_METADATA before check");
            return Ok(report);
        };
        report.checked += 1;
        let hash = row.hash.as_str();

        let info = match self.call("get_torrent", self.client.get_torrent(hash)).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                info!(hash = %hash, "Torrent no longer present in client");
                if self.transition(
                    hash,
                    &[PendingStatus::WaitingMetadata],
                    StatusUpdate::to(PendingStatus::Failed)
                        .with_error(FilterFailure::TorrentMissing.to_string()),
                )? {
                    report.failed += 1;
                }
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let files = if info.has_metadata() {
            self.call("get_files", self.client.get_files(hash)).await?
        } else {
            Vec::new()
        };

        if files.is_empty() {
            if row.retries_exhausted() {
                if self.time_out(&row).await? {
                    report.timed_out += 1;
                }
            } else {
                debug!(
                    hash = %hash,
                    attempt = row.retry_count,
                    max = row.max_retries,
                    "Metadata not resolved yet"
                );
                report.still_waiting += 1;
            }
            return Ok(report);
        }

        let total_size: u64 = files.iter().map(|f| f.size).sum();
        if !self.transition(
            hash,
            &[PendingStatus::WaitingMetadata],
            StatusUpdate::to(PendingStatus::MetadataReady).with_total_size(total_size),
        )? {
            return Ok(report);
        }
        info!(hash = %hash, files = files.len(), bytes = total_size, "Metadata resolved");

        let outcome = self.apply(hash, Some(files)).await?;
        report.record_apply(&outcome);
        Ok(report)
    }

    /// Give up on a row whose retry budget is spent. Returns whether this
    /// call moved it to TIMEOUT.
    pub(crate) async fn time_out(&self, row: &PendingTorrent) -> Result<bool, OrchestratorError> {
        let won = self.transition(
            &row.hash,
            &[PendingStatus::WaitingMetadata],
            StatusUpdate::to(PendingStatus::Timeout)
                .with_error(FilterFailure::MetadataTimeout(row.max_retries).to_string()),
        )?;
        if won {
            info!(hash = %row.hash, checks = row.retry_count, "Metadata wait timed out, removing torrent");
            self.remove_best_effort(&row.hash, true).await;
        }
        Ok(won)
    }

    /// Advance every non-terminal row once. Never fails; problems are
    /// counted and logged.
    pub(crate) async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        metrics::SWEEPS_TOTAL.inc();

        let rows = match self.store.list_active() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Failed to load pending torrents for sweep");
                return SweepReport {
                    errors: 1,
                    ..Default::default()
                };
            }
        };

        let report = Mutex::new(SweepReport::default());
        let row_timeout = Duration::from_secs(self.config.row_timeout_secs);
        let concurrency = self.config.sweep_concurrency.max(1);

        futures::stream::iter(rows)
            .for_each_concurrent(concurrency, |row| {
                let report = &report;
                async move {
                    let partial = match tokio::time::timeout(row_timeout, self.sweep_row(&row)).await {
                        Ok(Ok(partial)) => partial,
                        Ok(Err(e)) => {
                            warn!(hash = %row.hash, error = %e, "Sweep step failed, will retry next cycle");
                            SweepReport {
                                errors: 1,
                                ..Default::default()
                            }
                        }
                        Err(_) => {
                            warn!(hash = %row.hash, "Sweep step timed out, will retry next cycle");
                            SweepReport {
                                errors: 1,
                                ..Default::default()
                            }
                        }
                    };
                    if let Ok(mut total) = report.lock() {
                        total.merge(&partial);
                    }
                }
            })
            .await;

        let report = report.into_inner().unwrap_or_default();
        record_sweep_rows(&report);
        metrics::SWEEP_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());

        if report == SweepReport::default() {
            debug!("Sweep found nothing to do");
        } else {
            info!(
                checked = report.checked,
                completed = report.completed,
                failed = report.failed,
                timed_out = report.timed_out,
                waiting = report.still_waiting,
                recovered = report.recovered,
                errors = report.errors,
                "Sweep finished"
            );
        }
        report
    }

    async fn sweep_row(&self, row: &PendingTorrent) -> Result<SweepReport, OrchestratorError> {
        let mut report = SweepReport::default();

        match row.status {
            PendingStatus::WaitingMetadata if row.retries_exhausted() => {
                if self.time_out(row).await? {
                    report.timed_out += 1;
                }
            }
            PendingStatus::WaitingMetadata => return self.check(row).await,
            PendingStatus::MetadataReady => {
                let outcome = self.apply(&row.hash, None).await?;
                report.record_apply(&outcome);
            }
            PendingStatus::Filtering => {
                let stale_before =
                    Utc::now() - chrono::Duration::seconds(self.config.filtering_stale_secs as i64);
                if row.updated_at > stale_before {
                    debug!(hash = %row.hash, "Filtering in progress elsewhere, skipping");
                    return Ok(report);
                }
                if self.transition(
                    &row.hash,
                    &[PendingStatus::Filtering],
                    StatusUpdate::to(PendingStatus::MetadataReady),
                )? {
                    warn!(hash = %row.hash, since = %row.updated_at, "Recovering stale filtering attempt");
                    report.recovered += 1;
                    let outcome = self.apply(&row.hash, None).await?;
                    report.record_apply(&outcome);
                }
            }
            PendingStatus::Completed | PendingStatus::Failed | PendingStatus::Timeout => {}
        }

        Ok(report)
    }
}

fn record_sweep_rows(report: &SweepReport) {
    for (outcome, count) in [
        ("completed", report.completed),
        ("failed", report.failed),
        ("timed_out", report.timed_out),
        ("waiting", report.still_waiting),
        ("recovered", report.recovered),
        ("error", report.errors),
    ] {
        if count > 0 {
            metrics::SWEEP_ROWS
                .with_label_values(&[outcome])
                .inc_by(count as u64);
        }
    }
}
