//! Remote file operations built on the command executor.
//!
//! # Design
//! - Each operation is one shell invocation; every path goes through
//!   [`ShellCommand`] and is therefore escaped.
//! - Failures carry the tool's stderr verbatim.
//! - No existence pre-checks: the device reports conflicts itself, which
//!   avoids check-then-act races.

use std::sync::Arc;

use adbx_core::{CoreError, FileEntry, FsPath, PathKind};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{FsOpsError, FsOpsResult};
use crate::exec::{CommandExecutor, DeviceTicket, ShellCommand};
use crate::listing::parse_listing;

/// Stateless remote file operations.
#[derive(Clone)]
pub struct RemoteFileOps {
    executor: Arc<CommandExecutor>,
    recycle_root: Option<String>,
}

impl RemoteFileOps {
    /// Operations running through `executor`.
    #[must_use]
    pub const fn new(executor: Arc<CommandExecutor>) -> Self {
        Self {
            executor,
            recycle_root: None,
        }
    }

    /// Decode recycle metadata for entries listed directly under `root`.
    #[must_use]
    pub fn with_recycle_root(mut self, root: impl Into<String>) -> Self {
        self.recycle_root = Some(root.into());
        self
    }

    /// Executor backing these operations.
    #[must_use]
    pub fn executor(&self) -> &Arc<CommandExecutor> {
        &self.executor
    }

    /// Reserve the next place in `device_id`'s line.
    #[must_use]
    pub fn reserve(&self, device_id: &str) -> DeviceTicket {
        self.executor.reserve(device_id)
    }

    /// Delete all `paths` with a single `rm` invocation.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::RemoteOperationFailed`] with the tool's stderr,
    /// [`FsOpsError::Interrupted`] when canceled, or
    /// [`FsOpsError::InvalidPath`] when a path is not on the ticket's device.
    pub async fn delete(
        &self,
        ticket: DeviceTicket,
        paths: &[FsPath],
        recursive: bool,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        const OPERATION: &str = "delete";
        if paths.is_empty() {
            return Ok(());
        }
        for path in paths {
            ensure_remote(OPERATION, &ticket, path)?;
        }
        let command = ShellCommand::new("rm")
            .flag(if recursive { "-rf" } else { "-f" })
            .paths(paths);
        self.run(OPERATION, ticket, &command, cancel).await.map(drop)
    }

    /// Move `source` to the full path `destination`.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn move_path(
        &self,
        ticket: DeviceTicket,
        source: &FsPath,
        destination: &FsPath,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        const OPERATION: &str = "move";
        ensure_remote(OPERATION, &ticket, source)?;
        ensure_remote(OPERATION, &ticket, destination)?;
        let command = ShellCommand::new("mv").path(source).path(destination);
        self.run(OPERATION, ticket, &command, cancel).await.map(drop)
    }

    /// Create `path` and any missing parents; succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn make_dir(
        &self,
        ticket: DeviceTicket,
        path: &FsPath,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        const OPERATION: &str = "make_dir";
        ensure_remote(OPERATION, &ticket, path)?;
        let command = ShellCommand::new("mkdir").flag("-p").path(path);
        self.run(OPERATION, ticket, &command, cancel).await.map(drop)
    }

    /// Create an empty file or update its timestamp.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn make_file(
        &self,
        ticket: DeviceTicket,
        path: &FsPath,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        const OPERATION: &str = "make_file";
        ensure_remote(OPERATION, &ticket, path)?;
        let command = ShellCommand::new("touch").path(path);
        self.run(OPERATION, ticket, &command, cancel).await.map(drop)
    }

    /// Append `text` plus a newline to `path`.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn append_line(
        &self,
        ticket: DeviceTicket,
        path: &FsPath,
        text: &str,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        const OPERATION: &str = "append_line";
        ensure_remote(OPERATION, &ticket, path)?;
        let command = ShellCommand::new("printf")
            .flag("'%s\\n'")
            .arg(text)
            .append_to(path);
        self.run(OPERATION, ticket, &command, cancel).await.map(drop)
    }

    /// Read a remote file; stdout is returned as-is.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn read_all_text(
        &self,
        ticket: DeviceTicket,
        path: &FsPath,
        cancel: &CancellationToken,
    ) -> FsOpsResult<String> {
        const OPERATION: &str = "read_all_text";
        ensure_remote(OPERATION, &ticket, path)?;
        let command = ShellCommand::new("cat").path(path);
        self.run(OPERATION, ticket, &command, cancel).await
    }

    /// List the entries directly under `directory`.
    ///
    /// # Errors
    ///
    /// See [`RemoteFileOps::delete`].
    pub async fn list_dir(
        &self,
        ticket: DeviceTicket,
        directory: &FsPath,
        cancel: &CancellationToken,
    ) -> FsOpsResult<Vec<FileEntry>> {
        const OPERATION: &str = "list_dir";
        ensure_remote(OPERATION, &ticket, directory)?;
        // A trailing separator makes `ls` follow a symlinked directory.
        let target = if directory.is_root() {
            directory.full_path().to_string()
        } else {
            format!("{}/", directory.full_path())
        };
        let command = ShellCommand::new("ls").flag("-la").arg(target);
        let stdout = self.run(OPERATION, ticket, &command, cancel).await?;
        let recycle_root = self
            .recycle_root
            .as_deref()
            .and_then(|root| FsPath::remote(ticket_device(directory), root, true).ok());
        Ok(parse_listing(directory, &stdout, recycle_root.as_ref()))
    }

    async fn run(
        &self,
        operation: &'static str,
        ticket: DeviceTicket,
        command: &ShellCommand,
        cancel: &CancellationToken,
    ) -> FsOpsResult<String> {
        let device = ticket.device_id().to_string();
        match self.executor.shell(ticket, command, cancel).await {
            Ok(output) => Ok(output.stdout),
            Err(err) => {
                let err = FsOpsError::from_exec(operation, err);
                if !matches!(err, FsOpsError::Interrupted { .. }) {
                    warn!(
                        operation,
                        device = %device,
                        program = command.program(),
                        message = %err.user_message().trim_end(),
                        "remote operation failed"
                    );
                }
                Err(err)
            }
        }
    }
}

fn ensure_remote(operation: &'static str, ticket: &DeviceTicket, path: &FsPath) -> FsOpsResult<()> {
    let reason = if path.kind() != PathKind::Remote {
        "path is not on the remote device"
    } else if path.device_id() != Some(ticket.device_id()) {
        "path belongs to a different device"
    } else {
        return Ok(());
    };
    Err(FsOpsError::invalid_path(
        operation,
        CoreError::InvalidPath {
            operation,
            path: path.full_path().to_string(),
            reason,
        },
    ))
}

fn ticket_device(path: &FsPath) -> &str {
    path.device_id().unwrap_or_default()
}
