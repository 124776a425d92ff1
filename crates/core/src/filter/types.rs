//! Filter value types.

use serde::{Deserialize, Serialize};

use super::classify::{extension_of, is_sample_path, is_subtitle_extension, is_video_extension};

/// A file inside a torrent, classified once per filtering pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Position in the client's file list (priorities are committed by index).
    pub index: usize,
    /// Final path component.
    pub name: String,
    /// Full path inside the torrent.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Lowercase extension without the dot (empty if none).
    pub extension: String,
    pub is_video: bool,
    pub is_sample: bool,
    pub is_subtitle: bool,
}

impl TorrentFile {
    /// Build and classify a file from the client's view of it.
    pub fn new(index: usize, path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        let extension = extension_of(&name);

        Self {
            index,
            is_video: is_video_extension(&extension),
            is_subtitle: is_subtitle_extension(&extension),
            is_sample: is_sample_path(&path),
            name,
            path,
            size,
            extension,
        }
    }
}

/// Outcome of one filtering pass, persisted with the pending torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    /// Number of files the torrent contains.
    pub file_count: usize,
    /// Number of files selected for download.
    pub filtered_file_count: usize,
    /// Total bytes selected for download.
    pub filtered_size: u64,
}

impl FilterSnapshot {
    /// Summarize a selection. `kept` is expected to be a subset of `all`;
    /// the kept count is clamped so the snapshot never claims more kept
    /// files than exist.
    pub fn from_selection(all: &[TorrentFile], kept: &[TorrentFile]) -> Self {
        Self {
            file_count: all.len(),
            filtered_file_count: kept.len().min(all.len()),
            filtered_size: kept.iter().map(|f| f.size).sum(),
        }
    }

    /// True if the selection rejected every file.
    pub fn is_rejection(&self) -> bool {
        self.filtered_file_count == 0
    }
}
