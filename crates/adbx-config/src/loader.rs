//! Layered loading: defaults, then an optional TOML file, then `ADBX_*`
//! environment overrides, then validation.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{EngineConfig, ProgressMethod};
use crate::validate::validate;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "ADBX_";

/// Load configuration using the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, an override
/// is malformed, or the merged result fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<EngineConfig> {
    load_from(path, std::env::vars())
}

/// Load configuration from an optional file and an explicit variable set.
///
/// # Errors
///
/// See [`load`].
pub fn load_from<I, K, V>(path: Option<&Path>, vars: I) -> ConfigResult<EngineConfig>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => EngineConfig::default(),
    };
    for (key, value) in vars {
        if let Some(field) = key.as_ref().strip_prefix(ENV_PREFIX) {
            apply_override(&mut config, field, value.as_ref())?;
        }
    }
    validate(&config)?;
    debug!(
        adb = %config.adb_path.display(),
        transfer_concurrency = config.transfer_concurrency,
        progress_method = %config.progress_method,
        recycle_root = %config.recycle_root,
        "engine configuration loaded"
    );
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<EngineConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_override(config: &mut EngineConfig, field: &str, value: &str) -> ConfigResult<()> {
    match field {
        "ADB_PATH" => config.adb_path = PathBuf::from(value),
        "TRANSFER_CONCURRENCY" => {
            config.transfer_concurrency = parse_number("transfer_concurrency", value)?;
        }
        "PROGRESS_METHOD" => config.progress_method = ProgressMethod::from_str(value)?,
        "PROGRESS_POLL_MS" => config.progress_poll_ms = parse_number("progress_poll_ms", value)?,
        "ESTIMATE_THROUGHPUT_BPS" => {
            config.estimate_throughput_bps = parse_number("estimate_throughput_bps", value)?;
        }
        "RECYCLE_ROOT" => config.recycle_root = value.to_string(),
        "RECYCLE_INDEX_NAMES" => {
            config.recycle_index_names = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        "HELPER_DIR" => config.helper_dir = PathBuf::from(value),
        "EVENT_REPLAY_CAPACITY" => {
            config.event_replay_capacity = parse_number("event_replay_capacity", value)?;
        }
        // Other ADBX_* variables (logging, CLI globals) belong to other layers.
        _ => {}
    }
    Ok(())
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, Some(value.to_string()), "must be an integer"))
}
