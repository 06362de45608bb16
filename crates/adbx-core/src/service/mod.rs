//! Collaborator traits consumed by the operation engine.

use std::path::PathBuf;

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::model::{FileEntry, FsPath, OperationId, Relation};
use crate::progress::ProgressSink;

/// Source of the device identifier operations target by default.
pub trait DeviceRegistry: Send + Sync {
    /// Identifier of the currently selected device, if any.
    fn current_device_id(&self) -> Option<String>;
}

/// Read model of the directory listing shown to users.
#[async_trait]
pub trait DirectoryListing: Send + Sync {
    /// Entries that currently exist directly under `path`.
    async fn entries_under(&self, path: &FsPath) -> anyhow::Result<Vec<FileEntry>>;

    /// Directory currently displayed, if any.
    fn displayed_path(&self) -> Option<FsPath>;

    /// Called once per finished operation with the affected path and its
    /// relation to the displayed directory.
    fn notify_affected(&self, path: &FsPath, relation: Relation);
}

/// Direction of a byte transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Host to device.
    Push,
    /// Device to host.
    Pull,
}

impl TransferDirection {
    /// Subcommand name understood by the external tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

/// One push or pull handed to a [`TransferEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Operation the transfer belongs to.
    pub operation_id: OperationId,
    /// Transfer direction.
    pub direction: TransferDirection,
    /// Device the transfer targets.
    pub device_id: String,
    /// Path being copied.
    pub source: FsPath,
    /// Full target path.
    pub destination: FsPath,
    /// Host file the progress helper should write `[ NN%]` lines into.
    pub progress_file: Option<PathBuf>,
}

/// Exit status of a finished transfer subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferOutcome {
    /// Exit code; `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
}

impl TransferOutcome {
    /// Whether the transfer exited cleanly.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Byte mover for push and pull operations.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Run one transfer to completion, reporting progress through `progress`.
    ///
    /// Implementations stop the underlying process when `cancel` fires and
    /// return an error.
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<TransferOutcome>;

    /// Prepare the progress side channel; default implementation reports lack of support.
    async fn deploy_progress_helper(&self) -> anyhow::Result<()> {
        bail!("progress side channel not supported by this engine");
    }
}
