//! Field-level validation for loaded configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;

const MAX_TRANSFER_CONCURRENCY: usize = 16;

/// Check every field of a fully merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first offending field.
pub fn validate(config: &EngineConfig) -> ConfigResult<()> {
    if config.adb_path.as_os_str().is_empty() {
        return Err(ConfigError::invalid(
            "adb_path",
            None,
            "must not be empty",
        ));
    }
    if !(1..=MAX_TRANSFER_CONCURRENCY).contains(&config.transfer_concurrency) {
        return Err(ConfigError::invalid(
            "transfer_concurrency",
            Some(config.transfer_concurrency.to_string()),
            "must be between 1 and 16",
        ));
    }
    if config.progress_poll_ms == 0 {
        return Err(ConfigError::invalid(
            "progress_poll_ms",
            Some("0".into()),
            "must be positive",
        ));
    }
    if config.estimate_throughput_bps == 0 {
        return Err(ConfigError::invalid(
            "estimate_throughput_bps",
            Some("0".into()),
            "must be positive",
        ));
    }
    validate_recycle_root(&config.recycle_root)?;
    if let Some(bad) = config
        .recycle_index_names
        .iter()
        .find(|name| name.is_empty() || name.contains('/'))
    {
        return Err(ConfigError::invalid(
            "recycle_index_names",
            Some(bad.clone()),
            "must be plain file names",
        ));
    }
    if config.event_replay_capacity == 0 {
        return Err(ConfigError::invalid(
            "event_replay_capacity",
            Some("0".into()),
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_recycle_root(root: &str) -> ConfigResult<()> {
    let trimmed = root.trim_end_matches('/');
    if !root.starts_with('/') || trimmed.is_empty() {
        return Err(ConfigError::invalid(
            "recycle_root",
            Some(root.to_string()),
            "must be an absolute path below the filesystem root",
        ));
    }
    if trimmed.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ConfigError::invalid(
            "recycle_root",
            Some(root.to_string()),
            "must not contain relative segments",
        ));
    }
    Ok(())
}
