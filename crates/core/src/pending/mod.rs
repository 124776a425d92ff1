//! Persisted lifecycle of torrents submitted for filtered download.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqlitePendingStore;
pub use store::{CreatePendingRequest, PendingError, PendingStore, StatusUpdate};
pub use types::{
    PendingPage, PendingQuery, PendingStats, PendingStatus, PendingTorrent, TorrentSource,
    UnknownVariant, MAX_PAGE_SIZE,
};
