//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Clone, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid magnet link: {0}")]
    InvalidMagnet(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TorrentClientError {
    /// True if the client positively reported the torrent as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TorrentClientError::TorrentNotFound(_))
    }
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Fetching metadata from peers/DHT.
    FetchingMetadata,
    /// Downloading from peers.
    Downloading,
    /// Seeding to peers.
    Seeding,
    /// Download or upload is paused.
    Paused,
    /// Checking file integrity.
    Checking,
    /// Queued for download.
    Queued,
    /// Stalled (no peers).
    Stalled,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::FetchingMetadata => "fetching_metadata",
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Information about a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Display name. Clients report the raw hash here until metadata resolves.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes (0 until metadata resolves).
    pub size_bytes: u64,
    /// Save path on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    /// Content root on disk (file or top directory of the torrent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    /// Category/label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// When the torrent was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl TorrentInfo {
    /// Heuristic for "the client has resolved this torrent's metadata".
    ///
    /// Either the content path has moved below the save path, or the display
    /// name is something other than the raw hash. Single-file torrents whose
    /// content path equals the save path still resolve through the name.
    pub fn has_metadata(&self) -> bool {
        let content_differs = match (&self.content_path, &self.save_path) {
            (Some(content), Some(save)) => {
                !content.is_empty() && trim_separators(content) != trim_separators(save)
            }
            (Some(content), None) => !content.is_empty(),
            _ => false,
        };

        let name_differs = !self.name.is_empty() && !self.name.eq_ignore_ascii_case(&self.hash);

        content_differs || name_differs
    }
}

fn trim_separators(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
}

/// Download priority for a single file, in the client's file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download.
    Skip,
    /// Download normally.
    Normal,
}

impl FilePriority {
    /// Numeric value used on the wire (0 or 1).
    pub fn as_u8(&self) -> u8 {
        match self {
            FilePriority::Skip => 0,
            FilePriority::Normal => 1,
        }
    }
}

/// A file inside a torrent as the client reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentContentFile {
    /// Index within the torrent.
    pub index: usize,
    /// Path inside the torrent.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Current priority.
    pub priority: FilePriority,
}

/// Request to add a magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrentRequest {
    /// Magnet URI.
    pub uri: String,
    /// Optional download path override.
    pub save_path: Option<String>,
    /// Optional category/label.
    pub category: Option<String>,
    /// Start paused.
    pub paused: bool,
}

impl AddTorrentRequest {
    /// Create a magnet request with default options.
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            save_path: None,
            category: None,
            paused: false,
        }
    }

    /// Set the download path.
    pub fn with_save_path(mut self, path: impl Into<String>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, cat: impl Into<String>) -> Self {
        self.category = Some(cat.into());
        self
    }

    /// Set whether to start paused.
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}

/// Filters for listing torrents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentFilters {
    /// Filter by state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TorrentState>,
    /// Filter by category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Restrict to these hashes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
}

impl TorrentFilters {
    /// Check if any filters are set.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.category.is_none() && self.hashes.is_empty()
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent.
    pub hash: String,
    /// Name of the torrent (usually unknown for magnets initially).
    pub name: Option<String>,
}

/// Trait for torrent client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Add a magnet link.
    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError>;

    /// List all torrents, optionally filtered.
    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Get a specific torrent by hash.
    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError>;

    /// List a torrent's files. Empty until metadata resolves.
    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError>;

    /// Set per-file priorities, one entry per file in client order.
    async fn set_file_priorities(
        &self,
        hash: &str,
        priorities: &[FilePriority],
    ) -> Result<(), TorrentClientError>;

    /// Pause a torrent.
    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Resume a paused torrent.
    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Remove a torrent.
    /// If `delete_files` is true, also delete downloaded files.
    async fn remove_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), TorrentClientError>;
}

/// Extract the info hash from a magnet URI (lowercased).
pub fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .map(|hash| hash.trim().to_lowercase())
        .filter(|hash| !hash.is_empty())
}
