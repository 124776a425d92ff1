//! File selection for freshly resolved torrents.
//!
//! Given the file list a client reports once metadata is available, the
//! filter decides which files are worth downloading. It is pure: no I/O,
//! no shared state, and the same input always yields the same keep-set.
//!
//! ```text
//! files ──► smart pass (samples, subtitles)
//!       ──► size bounds
//!       ──► extension rules (allow / block / media-only)
//!       ──► keep-set   (empty ⇒ reject the torrent)
//! ```

mod classify;
mod config;
mod engine;
mod types;

pub use classify::{is_sample_path, is_subtitle_extension, is_video_extension};
pub use config::{FilterConfig, FilterConfigHandle};
pub use engine::select_files;
pub use types::{FilterSnapshot, TorrentFile};
