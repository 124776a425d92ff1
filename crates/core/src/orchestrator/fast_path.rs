//! Interactive submission: add paused, wait briefly, filter if possible.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::metrics;
use crate::pending::{CreatePendingRequest, PendingStatus, StatusUpdate};
use crate::torrent_client::{extract_hash_from_magnet, TorrentContentFile};

use super::context::Context;
use super::delayed::DelayedPool;
use super::types::{ApplyOutcome, OrchestratorError, SubmitOutcome, SubmitRequest};

impl Context {
    /// Submit a magnet for filtered download, waiting a bounded time for
    /// its file list.
    pub(crate) async fn submit(
        &self,
        request: SubmitRequest,
        delayed: &DelayedPool,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        let parsed = extract_hash_from_magnet(&request.magnet)
            .ok_or_else(|| OrchestratorError::InvalidMagnet(request.magnet.clone()))?;

        if let Some(row) = self.store.get(&parsed)? {
            if row.status.is_terminal() {
                info!(hash = %parsed, status = %row.status, "Duplicate submission of a finished torrent");
                metrics::FAST_PATH_OUTCOMES
                    .with_label_values(&["duplicate"])
                    .inc();
                return Ok(SubmitOutcome::from_row(&row));
            }
        }

        let known = match self.call("get_torrent", self.client.get_torrent(&parsed)).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                debug!(hash = %parsed, error = %e, "Could not look up torrent, adding anyway");
                false
            }
        };

        let hash = if known {
            info!(hash = %parsed, "Torrent already in client, filtering existing download");
            parsed
        } else {
            match self
                .add_paused(
                    &request.magnet,
                    request.save_path.as_deref(),
                    request.category.as_deref(),
                )
                .await
            {
                Ok(added) if !added.hash.is_empty() => added.hash.to_lowercase(),
                Ok(_) => parsed,
                Err(e) => {
                    warn!(hash = %parsed, error = %e, "Failed to add torrent");
                    metrics::FAST_PATH_OUTCOMES
                        .with_label_values(&["submit_failed"])
                        .inc();
                    return Ok(SubmitOutcome::submit_failed(
                        Some(parsed),
                        format!("failed to add torrent: {}", e),
                    ));
                }
            }
        };

        let (row, created) = self.store.create_if_absent(CreatePendingRequest {
            hash: hash.clone(),
            magnet: request.magnet.clone(),
            save_path: request.save_path.clone(),
            category: request.category.clone(),
            num: request.num.clone(),
            source: request.source,
            max_retries: self.config.max_retries,
        })?;
        if created {
            info!(hash = %hash, source = %row.source, "Tracking pending torrent");
        } else if row.status.is_terminal() {
            metrics::FAST_PATH_OUTCOMES
                .with_label_values(&["duplicate"])
                .inc();
            return Ok(SubmitOutcome::from_row(&row));
        }

        let Some(files) = self.wait_for_files(&hash).await else {
            return Ok(self.defer(&hash, delayed).await);
        };

        let total_size: u64 = files.iter().map(|f| f.size).sum();
        self.transition(
            &hash,
            &[PendingStatus::WaitingMetadata],
            StatusUpdate::to(PendingStatus::MetadataReady).with_total_size(total_size),
        )?;

        let outcome = self.apply(&hash, Some(files)).await?;
        if let Some(result) = SubmitOutcome::from_apply(&hash, &outcome) {
            let label = match outcome {
                ApplyOutcome::Completed(_) => "completed",
                ApplyOutcome::Rejected(_) => "rejected",
                _ => "failed",
            };
            metrics::FAST_PATH_OUTCOMES.with_label_values(&[label]).inc();
            return Ok(result);
        }

        if let ApplyOutcome::Deferred(_) = outcome {
            return Ok(self.defer(&hash, delayed).await);
        }

        // Another activity got there first
        metrics::FAST_PATH_OUTCOMES
            .with_label_values(&["superseded"])
            .inc();
        let row = self
            .store
            .get(&hash)?
            .ok_or_else(|| OrchestratorError::NotFound(hash.clone()))?;
        Ok(SubmitOutcome::from_row(&row))
    }

    /// Poll for the file list on the fast-path schedule: once right away,
    /// then once after each configured pause.
    async fn wait_for_files(&self, hash: &str) -> Option<Vec<TorrentContentFile>> {
        let mut pauses = self.config.fast_path_wait_ms.iter();
        let mut polls = 0u32;

        loop {
            polls += 1;
            match self.call("get_files", self.client.get_files(hash)).await {
                Ok(files) if !files.is_empty() => {
                    debug!(hash = %hash, polls, "File list available");
                    return Some(files);
                }
                Ok(_) => {}
                Err(e) => debug!(hash = %hash, error = %e, "File list not available"),
            }

            let pause = pauses.next()?;
            tokio::time::sleep(Duration::from_millis(*pause)).await;
        }
    }

    /// Let the torrent download unfiltered and keep trying in the background.
    async fn defer(&self, hash: &str, delayed: &DelayedPool) -> SubmitOutcome {
        info!(hash = %hash, "Metadata not ready in time, downloading unfiltered for now");
        self.resume_best_effort(hash).await;
        delayed.submit(self.clone(), hash.to_string());
        metrics::FAST_PATH_OUTCOMES
            .with_label_values(&["deferred"])
            .inc();
        SubmitOutcome::deferred(hash)
    }
}
