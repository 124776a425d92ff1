pub mod config;
pub mod filter;
pub mod metrics;
pub mod orchestrator;
pub mod pending;
pub mod testing;
pub mod torrent_client;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use filter::{select_files, FilterConfig, FilterConfigHandle, FilterSnapshot, TorrentFile};
pub use orchestrator::{
    FilterOrchestrator, OrchestratorConfig, OrchestratorError, SubmitOutcome, SubmitRequest,
    SweepReport,
};
pub use pending::{
    PendingPage, PendingQuery, PendingStats, PendingStatus, PendingStore, PendingTorrent,
    SqlitePendingStore, TorrentSource,
};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError};
