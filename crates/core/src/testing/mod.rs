//! Testing utilities and mock implementations.
//!
//! This module provides a scripted torrent client and fixtures so the
//! pipeline can be exercised end to end without a real qBittorrent.
//!
//! # Example
//!
//! ```rust,ignore
//! use sieve_core::testing::{fixtures, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! client.script_metadata(fixtures::HASH_A, fixtures::mixed_release(), 0).await;
//! ```

mod mock_torrent_client;

pub use mock_torrent_client::{ClientCall, MockOperation, MockTorrentClient};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::orchestrator::SubmitRequest;
    use crate::pending::TorrentSource;

    pub const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    pub const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    pub const HASH_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    const MB: u64 = 1024 * 1024;

    /// Magnet link for a hash.
    pub fn magnet(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{}&dn=Release", hash)
    }

    /// A submission for a hash with reasonable defaults.
    pub fn submit_request(hash: &str) -> SubmitRequest {
        SubmitRequest {
            magnet: magnet(hash),
            save_path: Some("/downloads".to_string()),
            category: Some("jav".to_string()),
            num: Some("ABC-123".to_string()),
            source: TorrentSource::Manual,
        }
    }

    /// A release with a main video, subtitle, sample and junk files.
    pub fn mixed_release() -> Vec<(&'static str, u64)> {
        vec![
            ("ABC-123/ABC-123.mp4", 1500 * MB),
            ("ABC-123/ABC-123.srt", MB / 10),
            ("ABC-123/sample/ABC-123-sample.mp4", 40 * MB),
            ("ABC-123/info.nfo", 2 * MB),
        ]
    }

    /// A release the default media-only rules keep nothing from.
    pub fn junk_release() -> Vec<(&'static str, u64)> {
        vec![("ABC-123/info.nfo", 2 * MB), ("ABC-123/readme.txt", MB)]
    }
}
