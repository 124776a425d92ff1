//! Types for the filter orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterSnapshot;
use crate::pending::{PendingStatus, PendingTorrent, TorrentSource};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No pending torrent with this hash.
    #[error("pending torrent not found: {0}")]
    NotFound(String),

    /// Invalid status for operation.
    #[error("cannot {operation} pending torrent {hash} in status {status}")]
    InvalidState {
        hash: String,
        status: PendingStatus,
        operation: &'static str,
    },

    /// The magnet link carries no info hash.
    #[error("invalid magnet link: {0}")]
    InvalidMagnet(String),

    /// Pending store error.
    #[error("pending store error: {0}")]
    Store(#[from] crate::pending::PendingError),

    /// Torrent client error.
    #[error("torrent client error: {0}")]
    TorrentClient(#[from] crate::torrent_client::TorrentClientError),
}

/// Why a pending torrent ended FAILED or TIMEOUT. Persisted as the row's
/// error message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterFailure {
    #[error("no files matched the filter rules")]
    NoFilesMatched,

    #[error("failed to commit file priorities: {0}")]
    CommitFailed(String),

    #[error("torrent no longer present in client")]
    TorrentMissing,

    #[error("metadata not resolved after {0} checks")]
    MetadataTimeout(u32),
}

/// Result of one filter-and-commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Priorities committed, download resumed.
    Completed(FilterSnapshot),
    /// Nothing passed the rules; torrent deleted.
    Rejected(FilterSnapshot),
    /// The client refused the priorities; torrent deleted.
    CommitFailed(FilterSnapshot, String),
    /// The client no longer knows the torrent.
    TorrentMissing,
    /// File list unavailable; row handed back to METADATA_READY.
    Deferred(String),
    /// Another activity owns (or already finished) this row.
    AlreadyHandled,
}

/// Submission for a filtered download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub magnet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Correlated media identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<String>,
    #[serde(default)]
    pub source: TorrentSource,
}

/// What the caller of the fast path learns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PendingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count_before: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count_after: Option<usize>,
}

impl SubmitOutcome {
    pub const DEFERRED_MESSAGE: &'static str = "accepted; filtering deferred";

    /// The torrent could not be handed to the client.
    pub fn submit_failed(hash: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            hash,
            message: message.into(),
            status: None,
            file_count_before: None,
            file_count_after: None,
        }
    }

    /// Metadata did not arrive in time; a background task will filter.
    pub fn deferred(hash: &str) -> Self {
        Self {
            success: true,
            hash: Some(hash.to_string()),
            message: Self::DEFERRED_MESSAGE.to_string(),
            status: Some(PendingStatus::WaitingMetadata),
            file_count_before: None,
            file_count_after: None,
        }
    }

    /// Report whatever state the row is in now.
    pub fn from_row(row: &PendingTorrent) -> Self {
        let message = match row.status {
            PendingStatus::Completed => "filtered and downloading".to_string(),
            PendingStatus::Failed | PendingStatus::Timeout => row
                .error_message
                .clone()
                .unwrap_or_else(|| format!("torrent {}", row.status)),
            PendingStatus::WaitingMetadata | PendingStatus::MetadataReady => {
                Self::DEFERRED_MESSAGE.to_string()
            }
            PendingStatus::Filtering => "filtering in progress".to_string(),
        };

        Self {
            success: !matches!(row.status, PendingStatus::Failed | PendingStatus::Timeout),
            hash: Some(row.hash.clone()),
            message,
            status: Some(row.status),
            file_count_before: row.filter_result.map(|s| s.file_count),
            file_count_after: row.filter_result.map(|s| s.filtered_file_count),
        }
    }

    pub(crate) fn from_apply(hash: &str, outcome: &ApplyOutcome) -> Option<Self> {
        let (success, status, message, snapshot) = match outcome {
            ApplyOutcome::Completed(snapshot) => (
                true,
                PendingStatus::Completed,
                format!(
                    "kept {} of {} files",
                    snapshot.filtered_file_count, snapshot.file_count
                ),
                snapshot,
            ),
            ApplyOutcome::Rejected(snapshot) => (
                false,
                PendingStatus::Failed,
                FilterFailure::NoFilesMatched.to_string(),
                snapshot,
            ),
            ApplyOutcome::CommitFailed(snapshot, reason) => (
                false,
                PendingStatus::Failed,
                FilterFailure::CommitFailed(reason.clone()).to_string(),
                snapshot,
            ),
            ApplyOutcome::TorrentMissing => {
                return Some(Self::submit_failed(
                    Some(hash.to_string()),
                    FilterFailure::TorrentMissing.to_string(),
                ))
            }
            ApplyOutcome::Deferred(_) | ApplyOutcome::AlreadyHandled => return None,
        };

        Some(Self {
            success,
            hash: Some(hash.to_string()),
            message,
            status: Some(status),
            file_count_before: Some(snapshot.file_count),
            file_count_after: Some(snapshot.filtered_file_count),
        })
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// WAITING_METADATA rows that went through a metadata check.
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub still_waiting: usize,
    /// Stale FILTERING rows handed back for another attempt.
    pub recovered: usize,
    /// Rows whose processing hit a transient error or timed out.
    pub errors: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: &SweepReport) {
        self.checked += other.checked;
        self.completed += other.completed;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.still_waiting += other.still_waiting;
        self.recovered += other.recovered;
        self.errors += other.errors;
    }

    pub(crate) fn record_apply(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Completed(_) => self.completed += 1,
            ApplyOutcome::Rejected(_)
            | ApplyOutcome::CommitFailed(..)
            | ApplyOutcome::TorrentMissing => self.failed += 1,
            ApplyOutcome::Deferred(_) => self.still_waiting += 1,
            ApplyOutcome::AlreadyHandled => {}
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the background loops are running.
    pub running: bool,
    /// Deferred filtering tasks still in flight.
    pub delayed_tasks: usize,
}
