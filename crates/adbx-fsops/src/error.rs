//! # Design
//!
//! - Constant-message errors for the command layer and the remote file operations.
//! - Tool output (stderr) is carried as a field, never interpolated into messages.
//! - `ExecError` describes a single invocation; `FsOpsError` describes a domain operation.

use std::io;
use std::path::PathBuf;

use adbx_core::CoreError;
use thiserror::Error;

/// Result type for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Result type for remote file operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while invoking the external tool.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The tool ran and reported failure.
    #[error("command failed")]
    CommandFailed {
        /// Exit code; `None` when the process was ended by a signal.
        exit_code: Option<i32>,
        /// Captured standard error (standard output when stderr was empty).
        stderr: String,
    },
    /// The process could not be started.
    #[error("failed to spawn command")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Reading process output or waiting for exit failed.
    #[error("command io failure")]
    Io {
        /// Step that failed.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The invocation was canceled and the process terminated.
    #[error("command interrupted")]
    Interrupted,
}

impl ExecError {
    pub(crate) const fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

/// Errors produced by remote file operations.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// The remote command failed; `message` is the tool's stderr verbatim.
    #[error("remote operation failed")]
    RemoteOperationFailed {
        /// Operation that failed.
        operation: &'static str,
        /// Exit code reported by the tool.
        exit_code: Option<i32>,
        /// Tool output explaining the failure.
        message: String,
    },
    /// The operation was canceled while its command was running.
    #[error("remote operation interrupted")]
    Interrupted {
        /// Operation that was interrupted.
        operation: &'static str,
    },
    /// A path argument was rejected before anything was sent to the device.
    #[error("invalid path argument")]
    InvalidPath {
        /// Operation that rejected the argument.
        operation: &'static str,
        /// Path validation failure.
        source: CoreError,
    },
    /// The external tool could not be run.
    #[error("external tool unavailable")]
    Exec {
        /// Operation that was attempted.
        operation: &'static str,
        /// Underlying execution error.
        source: ExecError,
    },
    /// Host filesystem failure (helper deployment, progress files).
    #[error("host io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl FsOpsError {
    pub(crate) fn from_exec(operation: &'static str, err: ExecError) -> Self {
        match err {
            ExecError::CommandFailed { exit_code, stderr } => Self::RemoteOperationFailed {
                operation,
                exit_code,
                message: stderr,
            },
            ExecError::Interrupted => Self::Interrupted { operation },
            other => Self::Exec {
                operation,
                source: other,
            },
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn invalid_path(operation: &'static str, source: CoreError) -> Self {
        Self::InvalidPath { operation, source }
    }

    /// Text shown to users for this failure: tool output when there is any,
    /// otherwise the error's own label.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteOperationFailed { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            Self::InvalidPath { source, .. } => source.label().to_string(),
            other => other.to_string(),
        }
    }
}
