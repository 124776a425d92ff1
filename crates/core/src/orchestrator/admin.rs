//! Operator actions and read views over pending torrents.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::pending::{PendingError, PendingPage, PendingQuery, PendingStats, PendingTorrent};

use super::context::Context;
use super::types::OrchestratorError;

impl Context {
    pub(crate) fn get_pending(&self, hash: &str) -> Result<PendingTorrent, OrchestratorError> {
        self.store
            .get(hash)?
            .ok_or_else(|| OrchestratorError::NotFound(hash.to_string()))
    }

    /// Put a FAILED or TIMEOUT row back to WAITING_METADATA with a fresh
    /// retry budget.
    pub(crate) async fn retry(&self, hash: &str) -> Result<PendingTorrent, OrchestratorError> {
        let row = self.get_pending(hash)?;
        if !row.status.is_retryable() {
            return Err(OrchestratorError::InvalidState {
                hash: hash.to_string(),
                status: row.status,
                operation: "retry",
            });
        }

        if !self.store.reset_for_retry(hash)? {
            let current = self.get_pending(hash)?;
            return Err(OrchestratorError::InvalidState {
                hash: hash.to_string(),
                status: current.status,
                operation: "retry",
            });
        }

        match self.call("get_torrent", self.client.get_torrent(hash)).await {
            Ok(_) => self.pause_best_effort(hash).await,
            Err(e) if e.is_not_found() => {
                debug!(hash = %hash, "Torrent gone from client, adding it again");
                if let Err(e) = self
                    .add_paused(&row.magnet, row.save_path.as_deref(), row.category.as_deref())
                    .await
                {
                    warn!(hash = %hash, error = %e, "Failed to re-add torrent, the sweep will mark it failed");
                }
            }
            Err(e) => warn!(hash = %hash, error = %e, "Could not reach client while retrying"),
        }

        info!(hash = %hash, previous = %row.status, "Pending torrent queued for retry");
        self.get_pending(hash)
    }

    /// Remove the torrent from the client, then forget the row.
    pub(crate) async fn delete_pending(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<PendingTorrent, OrchestratorError> {
        self.get_pending(hash)?;

        match self
            .call("remove", self.client.remove_torrent(hash, delete_files))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(hash = %hash, "Torrent already gone from client"),
            Err(e) => return Err(e.into()),
        }

        let row = self.store.delete(hash).map_err(|e| match e {
            PendingError::NotFound(hash) => OrchestratorError::NotFound(hash),
            other => other.into(),
        })?;
        info!(hash = %hash, status = %row.status, delete_files, "Pending torrent deleted");
        Ok(row)
    }

    pub(crate) fn list_pending(&self, query: &PendingQuery) -> Result<PendingPage, OrchestratorError> {
        let items = self.store.list(query)?;
        let total = self.store.count(query.status)?;
        Ok(PendingPage {
            items,
            total,
            page: query.effective_page(),
            page_size: query.effective_page_size(),
        })
    }

    pub(crate) fn statistics(&self) -> Result<PendingStats, OrchestratorError> {
        let stuck_before = Utc::now() - Duration::hours(i64::from(self.config.stuck_after_hours));
        Ok(self.store.statistics(stuck_before)?)
    }

    /// Delete terminal rows finished more than `retention_days` ago.
    pub(crate) fn cleanup_old(&self, retention_days: u32) -> Result<usize, OrchestratorError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let deleted = self.store.delete_terminal_before(cutoff)?;
        metrics::CLEANUP_DELETED.inc_by(deleted as u64);
        if deleted > 0 {
            info!(deleted, retention_days, "Purged finished pending torrents");
        } else {
            debug!(retention_days, "No finished pending torrents to purge");
        }
        Ok(deleted)
    }
}
