use std::sync::Arc;
use sieve_core::{Config, FilterOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<FilterOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<FilterOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Config without secrets, showing the filter rules currently in use.
    pub fn sanitized_config(&self) -> SanitizedConfig {
        let mut sanitized = SanitizedConfig::from(&self.config);
        sanitized.filter = self.orchestrator.filter_config();
        sanitized
    }

    pub fn orchestrator(&self) -> &FilterOrchestrator {
        &self.orchestrator
    }
}
