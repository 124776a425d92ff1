//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait for driving the external
//! BitTorrent client (currently qBittorrent) through its Web API.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
