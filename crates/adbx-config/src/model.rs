//! Typed engine configuration.
//!
//! # Design
//! - Pure data carrier; IO lives in `loader.rs`.
//! - Every field has a default so partial files are valid.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

/// How transfer progress is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMethod {
    /// Poll a progress file written by the deployed helper.
    #[default]
    SideChannel,
    /// Estimate from elapsed time and observed throughput.
    Estimate,
}

impl ProgressMethod {
    /// Render the method as its configuration string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SideChannel => "side_channel",
            Self::Estimate => "estimate",
        }
    }
}

impl fmt::Display for ProgressMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressMethod {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "side_channel" | "side-channel" => Ok(Self::SideChannel),
            "estimate" => Ok(Self::Estimate),
            _ => Err(ConfigError::invalid(
                "progress_method",
                Some(value.to_string()),
                "must be side_channel or estimate",
            )),
        }
    }
}

/// Settings consumed when building an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Executable invoked for every device command.
    pub adb_path: PathBuf,
    /// Transfers allowed to run at once.
    pub transfer_concurrency: usize,
    /// Progress strategy for transfers.
    pub progress_method: ProgressMethod,
    /// Milliseconds between progress polls.
    pub progress_poll_ms: u64,
    /// Throughput assumed before any transfer has been observed.
    pub estimate_throughput_bps: u64,
    /// Remote directory holding trashed items.
    pub recycle_root: String,
    /// Reserved file names under the recycle root.
    pub recycle_index_names: Vec<String>,
    /// Host directory receiving the progress helper and its progress files.
    pub helper_dir: PathBuf,
    /// Events retained for late subscribers.
    pub event_replay_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from(defaults::ADB_PATH),
            transfer_concurrency: defaults::TRANSFER_CONCURRENCY,
            progress_method: ProgressMethod::default(),
            progress_poll_ms: defaults::PROGRESS_POLL_MS,
            estimate_throughput_bps: defaults::ESTIMATE_THROUGHPUT_BPS,
            recycle_root: defaults::RECYCLE_ROOT.to_string(),
            recycle_index_names: defaults::RECYCLE_INDEX_NAMES
                .iter()
                .map(ToString::to_string)
                .collect(),
            helper_dir: std::env::temp_dir().join(defaults::HELPER_DIR_NAME),
            event_replay_capacity: defaults::EVENT_REPLAY_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Interval between progress polls.
    #[must_use]
    pub const fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    /// Whether `name` is one of the reserved recycle index names.
    #[must_use]
    pub fn is_recycle_index_name(&self, name: &str) -> bool {
        self.recycle_index_names.iter().any(|reserved| reserved == name)
    }
}
