#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Device-side plumbing: subprocess execution, shell escaping, the per-device
//! command gate, remote file operations, and the push/pull transfer engine.

pub mod error;
pub mod exec;
pub mod listing;
pub mod ops;
pub mod transfer;

pub use error::{ExecError, ExecResult, FsOpsError, FsOpsResult};
pub use exec::{
    AdbVersion, CommandExecutor, CommandOutput, CommandRunner, DeviceGate, DeviceInfo,
    DevicePermit, DeviceState, DeviceTicket, Invocation, MIN_ADB_VERSION, ProcessRunner,
    ShellCommand, escape_shell_arg, parse_devices, parse_version,
};
pub use listing::parse_listing;
pub use ops::RemoteFileOps;
pub use transfer::{AdbTransferEngine, HELPER_FILE_NAME, ProgressHelper, parse_progress_output};
