//! Filter rule configuration.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Declarative rules deciding which files of a torrent get downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Enable sample/subtitle classification pass.
    #[serde(default = "default_true")]
    pub smart_filter_enabled: bool,

    /// Drop files classified as samples, previews or promotional material.
    #[serde(default = "default_true")]
    pub skip_sample_files: bool,

    /// Drop subtitle files during the smart pass.
    #[serde(default)]
    pub skip_subtitle_only: bool,

    /// Minimum file size in MB (inclusive).
    #[serde(default)]
    pub min_file_size_mb: u64,

    /// Maximum file size in MB (inclusive). None means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,

    /// If non-empty, only these extensions are kept.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,

    /// Extensions to drop (ignored when `allowed_extensions` is set).
    #[serde(default)]
    pub blocked_extensions: Vec<String>,

    /// Restrict the keep-set to video files.
    #[serde(default)]
    pub media_files_only: bool,

    /// In media-only mode, also keep subtitle files.
    #[serde(default = "default_true")]
    pub include_subtitles: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            smart_filter_enabled: true,
            skip_sample_files: true,
            skip_subtitle_only: false,
            min_file_size_mb: 0,
            max_file_size_mb: None,
            allowed_extensions: Vec::new(),
            blocked_extensions: Vec::new(),
            media_files_only: false,
            include_subtitles: true,
        }
    }
}

impl FilterConfig {
    /// Lower size bound in bytes.
    pub fn min_size_bytes(&self) -> u64 {
        self.min_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Upper size bound in bytes, if any.
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_file_size_mb
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
    }

    /// Allow-list normalized to bare lowercase extensions.
    pub fn normalized_allowed(&self) -> Vec<String> {
        normalize_extensions(&self.allowed_extensions)
    }

    /// Block-list normalized to bare lowercase extensions.
    pub fn normalized_blocked(&self) -> Vec<String> {
        normalize_extensions(&self.blocked_extensions)
    }
}

fn normalize_extensions(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Shared, swappable view of the active filter rules.
///
/// Readers take a snapshot per filtering pass, so a rule change never
/// affects a pass already in progress.
#[derive(Debug, Clone, Default)]
pub struct FilterConfigHandle {
    inner: Arc<RwLock<FilterConfig>>,
}

impl FilterConfigHandle {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Snapshot of the rules currently in effect.
    pub fn current(&self) -> FilterConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the active rules.
    pub fn replace(&self, config: FilterConfig) {
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}
