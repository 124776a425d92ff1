//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the filter orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the background loops.
    /// When disabled, sweeps and cleanups must be triggered via API.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often to sweep non-terminal rows (milliseconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Metadata checks a row gets before it times out.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Rows processed concurrently within one sweep.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,

    /// Upper bound on the work done for a single row (seconds).
    #[serde(default = "default_row_timeout")]
    pub row_timeout_secs: u64,

    /// Upper bound on a single torrent client call (seconds).
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,

    /// A row left in `filtering` longer than this is considered abandoned
    /// and is handed back to the sweep (seconds).
    #[serde(default = "default_filtering_stale")]
    pub filtering_stale_secs: u64,

    /// Fast path poll schedule. The first poll is immediate; each entry is
    /// the pause before the next one (milliseconds).
    #[serde(default = "default_fast_path_wait")]
    pub fast_path_wait_ms: Vec<u64>,

    /// Checks made by a deferred filtering task before giving up.
    #[serde(default = "default_delayed_attempts")]
    pub delayed_attempts: u32,

    /// Pause between deferred filtering checks (milliseconds).
    #[serde(default = "default_delayed_interval")]
    pub delayed_interval_ms: u64,

    /// How often the cleanup loop runs (seconds).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Terminal rows older than this are purged by cleanup (days).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Non-terminal rows older than this are reported as stuck (hours).
    #[serde(default = "default_stuck_after")]
    pub stuck_after_hours: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300_000 // 5 minutes
}

fn default_max_retries() -> u32 {
    10
}

fn default_sweep_concurrency() -> usize {
    4
}

fn default_row_timeout() -> u64 {
    120
}

fn default_client_timeout() -> u64 {
    15
}

fn default_filtering_stale() -> u64 {
    600 // 10 minutes
}

fn default_fast_path_wait() -> Vec<u64> {
    vec![1000, 1000, 2000, 2000, 3000, 3000, 4000, 5000]
}

fn default_delayed_attempts() -> u32 {
    10
}

fn default_delayed_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_cleanup_interval() -> u64 {
    86_400 // daily
}

fn default_retention_days() -> u32 {
    7
}

fn default_stuck_after() -> u32 {
    24
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_ms: default_sweep_interval(),
            max_retries: default_max_retries(),
            sweep_concurrency: default_sweep_concurrency(),
            row_timeout_secs: default_row_timeout(),
            client_timeout_secs: default_client_timeout(),
            filtering_stale_secs: default_filtering_stale(),
            fast_path_wait_ms: default_fast_path_wait(),
            delayed_attempts: default_delayed_attempts(),
            delayed_interval_ms: default_delayed_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            retention_days: default_retention_days(),
            stuck_after_hours: default_stuck_after(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.enabled);
        assert_eq!(config.sweep_interval_ms, 300_000);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.sweep_concurrency, 4);
        assert_eq!(config.filtering_stale_secs, 600);
        assert_eq!(config.fast_path_wait_ms.iter().sum::<u64>(), 21_000);
        assert_eq!(config.delayed_attempts, 10);
        assert_eq!(config.delayed_interval_ms, 30_000);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            enabled = false
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.sweep_interval_ms, 300_000);
        assert_eq!(config.fast_path_wait_ms.len(), 8);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            enabled = true
            sweep_interval_ms = 60000
            max_retries = 3
            sweep_concurrency = 8
            row_timeout_secs = 30
            client_timeout_secs = 5
            filtering_stale_secs = 120
            fast_path_wait_ms = [500, 500]
            delayed_attempts = 2
            delayed_interval_ms = 1000
            cleanup_interval_secs = 3600
            retention_days = 14
            stuck_after_hours = 6
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sweep_interval_ms, 60000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sweep_concurrency, 8);
        assert_eq!(config.fast_path_wait_ms, vec![500, 500]);
        assert_eq!(config.delayed_attempts, 2);
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.stuck_after_hours, 6);
    }
}
