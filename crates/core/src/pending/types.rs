//! Pending torrent data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterSnapshot;

/// Largest page the listing endpoints hand out.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Error produced when a stored or requested enum value is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle state of a pending torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Added to the client, file list not known yet.
    WaitingMetadata,
    /// File list known, filtering not started.
    MetadataReady,
    /// Someone is selecting files and committing priorities.
    Filtering,
    /// Filter committed and the download resumed.
    Completed,
    /// Rejected by the rules, commit failed, or torrent vanished.
    Failed,
    /// Metadata never resolved within the retry budget.
    Timeout,
}

impl PendingStatus {
    pub const ALL: [PendingStatus; 6] = [
        PendingStatus::WaitingMetadata,
        PendingStatus::MetadataReady,
        PendingStatus::Filtering,
        PendingStatus::Completed,
        PendingStatus::Failed,
        PendingStatus::Timeout,
    ];

    /// Statuses the sweep still has work for.
    pub const ACTIVE: [PendingStatus; 3] = [
        PendingStatus::WaitingMetadata,
        PendingStatus::MetadataReady,
        PendingStatus::Filtering,
    ];

    /// Statuses cleanup may purge.
    pub const TERMINAL: [PendingStatus; 3] = [
        PendingStatus::Completed,
        PendingStatus::Failed,
        PendingStatus::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::WaitingMetadata => "waiting_metadata",
            PendingStatus::MetadataReady => "metadata_ready",
            PendingStatus::Filtering => "filtering",
            PendingStatus::Completed => "completed",
            PendingStatus::Failed => "failed",
            PendingStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Whether an operator retry is allowed from this status.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PendingStatus::Failed | PendingStatus::Timeout)
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PendingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "pending status",
                value: s.to_string(),
            })
    }
}

/// Where a submission came from. Opaque to the pipeline, kept for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentSource {
    Subscribe,
    AutoDownload,
    #[default]
    Manual,
}

impl TorrentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentSource::Subscribe => "subscribe",
            TorrentSource::AutoDownload => "auto_download",
            TorrentSource::Manual => "manual",
        }
    }
}

impl fmt::Display for TorrentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TorrentSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(TorrentSource::Subscribe),
            "auto_download" => Ok(TorrentSource::AutoDownload),
            "manual" => Ok(TorrentSource::Manual),
            other => Err(UnknownVariant {
                kind: "torrent source",
                value: other.to_string(),
            }),
        }
    }
}

/// One torrent tracked through metadata resolution and filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTorrent {
    /// Info hash (lowercase hex), unique.
    pub hash: String,
    pub magnet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Correlated media identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num: Option<String>,
    pub source: TorrentSource,
    pub status: PendingStatus,
    /// Metadata checks made so far.
    pub retry_count: u32,
    pub max_retries: u32,
    /// Torrent size in bytes once metadata resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_result: Option<FilterSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PendingTorrent {
    /// True once the metadata check budget is used up.
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Listing parameters. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PendingStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

impl Default for PendingQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PendingQuery {
    pub fn with_status(mut self, status: PendingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Page number, at least 1.
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        self.effective_page_size() as i64
    }

    pub fn offset(&self) -> i64 {
        (self.effective_page() as i64 - 1) * self.limit()
    }
}

/// One page of pending torrents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPage {
    pub items: Vec<PendingTorrent>,
    /// Rows matching the query across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Row counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStats {
    pub total: u64,
    pub waiting_metadata: u64,
    pub metadata_ready: u64,
    pub filtering: u64,
    pub completed: u64,
    pub failed: u64,
    pub timeout: u64,
    /// Non-terminal rows added before the stuck threshold.
    pub stuck: u64,
}

impl PendingStats {
    pub fn count_for(&self, status: PendingStatus) -> u64 {
        match status {
            PendingStatus::WaitingMetadata => self.waiting_metadata,
            PendingStatus::MetadataReady => self.metadata_ready,
            PendingStatus::Filtering => self.filtering,
            PendingStatus::Completed => self.completed,
            PendingStatus::Failed => self.failed,
            PendingStatus::Timeout => self.timeout,
        }
    }

    pub(crate) fn set_count(&mut self, status: PendingStatus, count: u64) {
        let slot = match status {
            PendingStatus::WaitingMetadata => &mut self.waiting_metadata,
            PendingStatus::MetadataReady => &mut self.metadata_ready,
            PendingStatus::Filtering => &mut self.filtering,
            PendingStatus::Completed => &mut self.completed,
            PendingStatus::Failed => &mut self.failed,
            PendingStatus::Timeout => &mut self.timeout,
        };
        *slot = count;
    }
}
