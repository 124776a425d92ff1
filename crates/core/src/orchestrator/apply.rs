//! Filter-and-commit, shared by the sweep, the fast path and deferred tasks.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::filter::{select_files, FilterSnapshot, TorrentFile};
use crate::pending::{PendingStatus, StatusUpdate};
use crate::torrent_client::{FilePriority, TorrentContentFile};

use super::context::Context;
use super::types::{ApplyOutcome, FilterFailure, OrchestratorError};

impl Context {
    /// Select and commit the files to download for a METADATA_READY row.
    ///
    /// `prefetched` is a file list the caller already holds; an empty or
    /// missing list is fetched from the client.
    pub(crate) async fn apply(
        &self,
        hash: &str,
        prefetched: Option<Vec<TorrentContentFile>>,
    ) -> Result<ApplyOutcome, OrchestratorError> {
        if !self.claim(hash)? {
            return Ok(ApplyOutcome::AlreadyHandled);
        }
        self.filter_owned(hash, prefetched).await
    }

    /// Like [`apply`](Self::apply), for a torrent that is already downloading.
    ///
    /// The torrent is paused only once this caller owns the row, and resumed
    /// again if the row is handed back or the attempt errors.
    pub(crate) async fn apply_paused(
        &self,
        hash: &str,
        prefetched: Option<Vec<TorrentContentFile>>,
    ) -> Result<ApplyOutcome, OrchestratorError> {
        if !self.claim(hash)? {
            return Ok(ApplyOutcome::AlreadyHandled);
        }
        self.pause_best_effort(hash).await;

        let result = self.filter_owned(hash, prefetched).await;
        if matches!(result, Ok(ApplyOutcome::Deferred(_)) | Err(_)) {
            self.resume_best_effort(hash).await;
        }
        result
    }

    /// METADATA_READY -> FILTERING. False when another activity got there first.
    fn claim(&self, hash: &str) -> Result<bool, OrchestratorError> {
        Ok(self.transition(
            hash,
            &[PendingStatus::MetadataReady],
            StatusUpdate::to(PendingStatus::Filtering),
        )?)
    }

    async fn filter_owned(
        &self,
        hash: &str,
        prefetched: Option<Vec<TorrentContentFile>>,
    ) -> Result<ApplyOutcome, OrchestratorError> {
        let content = match prefetched.filter(|files| !files.is_empty()) {
            Some(files) => files,
            None => match self.call("get_files", self.client.get_files(hash)).await {
                Ok(files) if !files.is_empty() => files,
                Ok(_) => return self.hand_back(hash, "file list is empty".to_string()),
                Err(e) if e.is_not_found() => {
                    self.transition(
                        hash,
                        &[PendingStatus::Filtering],
                        StatusUpdate::to(PendingStatus::Failed)
                            .with_error(FilterFailure::TorrentMissing.to_string()),
                    )?;
                    return Ok(ApplyOutcome::TorrentMissing);
                }
                Err(e) => return self.hand_back(hash, e.to_string()),
            },
        };

        let files: Vec<TorrentFile> = content
            .iter()
            .map(|f| TorrentFile::new(f.index, f.name.clone(), f.size))
            .collect();
        let rules = self.filter.current();
        let kept = select_files(&files, &rules);
        let snapshot = FilterSnapshot::from_selection(&files, &kept);

        if snapshot.is_rejection() {
            info!(hash = %hash, files = files.len(), "No files matched the filter rules, removing torrent");
            self.remove_best_effort(hash, true).await;
            self.transition(
                hash,
                &[PendingStatus::Filtering],
                StatusUpdate::to(PendingStatus::Failed)
                    .with_error(FilterFailure::NoFilesMatched.to_string())
                    .with_filter_result(snapshot),
            )?;
            return Ok(ApplyOutcome::Rejected(snapshot));
        }

        let priorities = priorities_for(&files, &kept);
        if let Err(e) = self
            .call(
                "set_file_priorities",
                self.client.set_file_priorities(hash, &priorities),
            )
            .await
        {
            warn!(hash = %hash, error = %e, "Failed to commit file priorities, removing torrent");
            self.remove_best_effort(hash, true).await;
            self.transition(
                hash,
                &[PendingStatus::Filtering],
                StatusUpdate::to(PendingStatus::Failed)
                    .with_error(FilterFailure::CommitFailed(e.to_string()).to_string())
                    .with_filter_result(snapshot),
            )?;
            return Ok(ApplyOutcome::CommitFailed(snapshot, e.to_string()));
        }

        self.resume_best_effort(hash).await;

        if !self.transition(
            hash,
            &[PendingStatus::Filtering],
            StatusUpdate::to(PendingStatus::Completed).with_filter_result(snapshot),
        )? {
            warn!(hash = %hash, "Row left FILTERING while committing");
        }

        info!(
            hash = %hash,
            kept = snapshot.filtered_file_count,
            total = snapshot.file_count,
            bytes = snapshot.filtered_size,
            "Filter applied"
        );
        Ok(ApplyOutcome::Completed(snapshot))
    }

    /// Return the row to METADATA_READY so a later pass retries it.
    fn hand_back(&self, hash: &str, reason: String) -> Result<ApplyOutcome, OrchestratorError> {
        warn!(hash = %hash, reason = %reason, "File list unavailable, deferring filter");
        self.transition(
            hash,
            &[PendingStatus::Filtering],
            StatusUpdate::to(PendingStatus::MetadataReady),
        )?;
        Ok(ApplyOutcome::Deferred(reason))
    }
}

/// One priority per file, in client order.
fn priorities_for(files: &[TorrentFile], kept: &[TorrentFile]) -> Vec<FilePriority> {
    let kept: HashSet<usize> = kept.iter().map(|f| f.index).collect();
    files
        .iter()
        .map(|f| {
            if kept.contains(&f.index) {
                FilePriority::Normal
            } else {
                FilePriority::Skip
            }
        })
        .collect()
}
