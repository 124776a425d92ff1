use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - qBittorrent URL is set
/// - Orchestrator intervals, retry budget and fast-path schedule are usable
/// - Filter size bounds are ordered
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.torrent_client.qbittorrent.url.trim().is_empty() {
        return Err(invalid("torrent_client.qbittorrent.url cannot be empty"));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.sweep_interval_ms == 0 {
        return Err(invalid("orchestrator.sweep_interval_ms cannot be 0"));
    }
    if orchestrator.delayed_interval_ms == 0 {
        return Err(invalid("orchestrator.delayed_interval_ms cannot be 0"));
    }
    if orchestrator.cleanup_interval_secs == 0 {
        return Err(invalid("orchestrator.cleanup_interval_secs cannot be 0"));
    }
    if orchestrator.max_retries == 0 {
        return Err(invalid("orchestrator.max_retries cannot be 0"));
    }
    if orchestrator.fast_path_wait_ms.is_empty() {
        return Err(invalid("orchestrator.fast_path_wait_ms cannot be empty"));
    }
    if orchestrator.sweep_concurrency == 0 {
        return Err(invalid("orchestrator.sweep_concurrency cannot be 0"));
    }

    if let Some(max) = config.filter.max_file_size_mb {
        if config.filter.min_file_size_mb > max {
            return Err(invalid(
                "filter.min_file_size_mb cannot exceed filter.max_file_size_mb",
            ));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
