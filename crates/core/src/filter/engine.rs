//! The selection passes.

use super::classify::{is_subtitle_extension, is_video_extension};
use super::{FilterConfig, TorrentFile};

/// Select the files worth downloading.
///
/// Passes run in a fixed order (smart classification, size bounds,
/// extension rules) and each one only removes files, so the result keeps
/// the input order and `select_files(select_files(f, c), c) == select_files(f, c)`.
/// An empty result means the whole torrent should be rejected.
pub fn select_files(files: &[TorrentFile], config: &FilterConfig) -> Vec<TorrentFile> {
    let allowed = config.normalized_allowed();
    let blocked = config.normalized_blocked();
    let min_size = config.min_size_bytes();
    let max_size = config.max_size_bytes();

    files
        .iter()
        .filter(|file| passes_smart(file, config))
        .filter(|file| file.size >= min_size && max_size.is_none_or(|max| file.size <= max))
        .filter(|file| passes_extension(file, config, &allowed, &blocked))
        .cloned()
        .collect()
}

fn passes_smart(file: &TorrentFile, config: &FilterConfig) -> bool {
    if !config.smart_filter_enabled {
        return true;
    }
    if config.skip_sample_files && file.is_sample {
        return false;
    }
    if config.skip_subtitle_only && file.is_subtitle {
        return false;
    }
    true
}

fn passes_extension(
    file: &TorrentFile,
    config: &FilterConfig,
    allowed: &[String],
    blocked: &[String],
) -> bool {
    let ext = file.extension.as_str();

    if !allowed.is_empty() {
        if !allowed.iter().any(|a| a == ext) {
            return false;
        }
    } else if blocked.iter().any(|b| b == ext) {
        return false;
    }

    if config.media_files_only {
        return is_video_extension(ext) || (config.include_subtitles && is_subtitle_extension(ext));
    }

    true
}
