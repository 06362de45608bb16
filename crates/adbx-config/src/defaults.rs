//! Default values for engine configuration.
//!
//! # Design
//! - Centralize defaults so the model, loader, and tests agree.

/// Executable invoked for every device command.
pub(crate) const ADB_PATH: &str = "adb";
/// Transfers allowed to run at once; one matches a single tool connection.
pub(crate) const TRANSFER_CONCURRENCY: usize = 1;
/// Interval between progress side-channel polls.
pub(crate) const PROGRESS_POLL_MS: u64 = 250;
/// Throughput assumed before any transfer has been observed (8 MiB/s).
pub(crate) const ESTIMATE_THROUGHPUT_BPS: u64 = 8 * 1024 * 1024;
/// Remote directory holding trashed items.
pub(crate) const RECYCLE_ROOT: &str = "/sdcard/.Trash-adbx";
/// Index files living in the recycle root that are never trashed or restored.
pub(crate) const RECYCLE_INDEX_NAMES: [&str; 2] = [".RecycleIndex", ".RecycleIndex.bak"];
/// Events retained for late subscribers.
pub(crate) const EVENT_REPLAY_CAPACITY: usize = 1_024;
/// Directory name (under the system temp dir) for deployed helper files.
pub(crate) const HELPER_DIR_NAME: &str = "adbx-helper";
