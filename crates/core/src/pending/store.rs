//! Pending torrent storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::filter::FilterSnapshot;

use super::{PendingQuery, PendingStats, PendingStatus, PendingTorrent, TorrentSource};

/// Error type for pending torrent storage.
#[derive(Debug, Error)]
pub enum PendingError {
    /// No row for this hash.
    #[error("Pending torrent not found: {0}")]
    NotFound(String),

    /// Cannot perform operation due to current status.
    #[error("Cannot {operation} pending torrent {hash}: current status is {status}")]
    InvalidState {
        hash: String,
        status: PendingStatus,
        operation: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to start tracking a torrent.
#[derive(Debug, Clone)]
pub struct CreatePendingRequest {
    pub hash: String,
    pub magnet: String,
    pub save_path: Option<String>,
    pub category: Option<String>,
    pub num: Option<String>,
    pub source: TorrentSource,
    pub max_retries: u32,
}

/// Fields written together with a status change.
///
/// `None` leaves the stored value untouched. Moving into a terminal status
/// stamps `completed_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: PendingStatus,
    pub error_message: Option<String>,
    pub filter_result: Option<FilterSnapshot>,
    pub total_size: Option<u64>,
}

impl StatusUpdate {
    pub fn to(status: PendingStatus) -> Self {
        Self {
            status,
            error_message: None,
            filter_result: None,
            total_size: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_filter_result(mut self, snapshot: FilterSnapshot) -> Self {
        self.filter_result = Some(snapshot);
        self
    }

    pub fn with_total_size(mut self, size: u64) -> Self {
        self.total_size = Some(size);
        self
    }
}

/// Trait for pending torrent storage backends.
///
/// Status changes are compare-and-set: they only apply when the row is in one
/// of the expected statuses, and report whether they did.
pub trait PendingStore: Send + Sync {
    /// Insert a WAITING_METADATA row unless one already exists for the hash.
    /// Returns the stored row and whether it was created by this call.
    fn create_if_absent(
        &self,
        request: CreatePendingRequest,
    ) -> Result<(PendingTorrent, bool), PendingError>;

    /// Get a row by hash.
    fn get(&self, hash: &str) -> Result<Option<PendingTorrent>, PendingError>;

    /// List rows newest first.
    fn list(&self, query: &PendingQuery) -> Result<Vec<PendingTorrent>, PendingError>;

    /// Count rows, optionally restricted to one status.
    fn count(&self, status: Option<PendingStatus>) -> Result<u64, PendingError>;

    /// Rows the sweep still has work for, oldest first.
    fn list_active(&self) -> Result<Vec<PendingTorrent>, PendingError>;

    /// Bump `retry_count` and stamp `last_check_at` if the row is still
    /// WAITING_METADATA. Returns the updated row, or `None` if it was not.
    fn record_check(&self, hash: &str) -> Result<Option<PendingTorrent>, PendingError>;

    /// Move the row to `update.status` if its status is one of `from`.
    fn transition(
        &self,
        hash: &str,
        from: &[PendingStatus],
        update: StatusUpdate,
    ) -> Result<bool, PendingError>;

    /// Put a FAILED/TIMEOUT row back to WAITING_METADATA with a fresh budget,
    /// clearing the error, filter result and completion time.
    fn reset_for_retry(&self, hash: &str) -> Result<bool, PendingError>;

    /// Delete a row, returning it.
    fn delete(&self, hash: &str) -> Result<PendingTorrent, PendingError>;

    /// Delete terminal rows completed before `cutoff`.
    fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PendingError>;

    /// Per-status counts; non-terminal rows added before `stuck_before` are stuck.
    fn statistics(&self, stuck_before: DateTime<Utc>) -> Result<PendingStats, PendingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_builder() {
        let snapshot = FilterSnapshot {
            file_count: 3,
            filtered_file_count: 0,
            filtered_size: 0,
        };
        let update = StatusUpdate::to(PendingStatus::Failed)
            .with_error("no files matched")
            .with_filter_result(snapshot)
            .with_total_size(42);

        assert_eq!(update.status, PendingStatus::Failed);
        assert_eq!(update.error_message.as_deref(), Some("no files matched"));
        assert_eq!(update.filter_result, Some(snapshot));
        assert_eq!(update.total_size, Some(42));
    }

    #[test]
    fn test_error_display() {
        let err = PendingError::InvalidState {
            hash: "abc".to_string(),
            status: PendingStatus::Completed,
            operation: "retry".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot retry pending torrent abc: current status is completed"
        );
        assert_eq!(
            PendingError::NotFound("abc".to_string()).to_string(),
            "Pending torrent not found: abc"
        );
    }
}
