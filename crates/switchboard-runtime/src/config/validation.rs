//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, RemoteConfig, StorageConfig, SwitchboardConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchboardConfig) -> ConfigResult<()> {
    validate_logging(config)?;
    validate_storage(&config.storage)?;
    if let Some(remote) = &config.remote {
        validate_remote(remote)?;
    }

    if !config.defaults.is_object() {
        return Err(ConfigError::validation("`defaults` must be a table"));
    }

    Ok(())
}

fn validate_logging(config: &SwitchboardConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> ConfigResult<()> {
    if storage.key.trim().is_empty() {
        return Err(ConfigError::missing_field("storage.key"));
    }
    Ok(())
}

fn validate_remote(remote: &RemoteConfig) -> ConfigResult<()> {
    if remote.name.trim().is_empty() {
        return Err(ConfigError::missing_field("remote.name"));
    }

    if remote.source.is_empty() {
        return Err(ConfigError::missing_field("remote.source"));
    }

    if remote.refresh_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Remote refresh interval must be greater than 0",
        ));
    }

    if remote.is_http() {
        if !cfg!(feature = "http-remote") {
            return Err(ConfigError::invalid_source(
                &remote.source,
                "HTTP sources require the `http-remote` feature",
            ));
        }
        if remote.timeout_secs == 0 {
            return Err(ConfigError::validation("Remote timeout must be greater than 0"));
        }
    } else if let Some((scheme, _)) = remote.source.split_once("://") {
        return Err(ConfigError::invalid_source(
            &remote.source,
            format!("Unsupported scheme `{scheme}`, expected http, https or a file path"),
        ));
    }

    Ok(())
}
