//! Filter orchestrator for torrent metadata resolution and file filtering.
//!
//! Three activities share the pending store and the torrent client:
//! - **Fast path**: interactive submission with a bounded metadata wait
//! - **Delayed tasks**: short background retries when the fast path gives up
//! - **Sweep**: periodic reconciliation of every non-terminal row
//!
//! They coordinate only through compare-and-set status updates, so whichever
//! sees the metadata first does the filtering and the others back off.

mod admin;
mod apply;
mod config;
mod context;
mod delayed;
mod fast_path;
mod poller;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::FilterOrchestrator;
pub use types::{
    ApplyOutcome, FilterFailure, OrchestratorError, OrchestratorStatus, SubmitOutcome,
    SubmitRequest, SweepReport,
};
