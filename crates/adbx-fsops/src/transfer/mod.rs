//! Push/pull engine backed by the external tool.
//!
//! # Design
//! - Transfers wait in the same per-device line as shell commands; the place
//!   is reserved when the transfer starts, not when it was queued.
//! - With a deployed helper and a progress file, the tool runs under the
//!   helper so its terminal progress lands in that file.
//! - A non-zero exit is an outcome, not an error; errors mean the tool could
//!   not run or the transfer was canceled.

mod helper;

use std::path::Path;
use std::sync::Arc;

use adbx_core::{
    CoreError, FsPath, PathKind, ProgressSink, TransferDirection, TransferEngine,
    TransferOutcome, TransferRequest,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use helper::{HELPER_FILE_NAME, ProgressHelper};

use crate::error::{ExecError, FsOpsError, FsOpsResult};
use crate::exec::{CommandExecutor, Invocation};

/// Transfer engine running `push`/`pull` subcommands.
pub struct AdbTransferEngine {
    executor: Arc<CommandExecutor>,
    helper: ProgressHelper,
}

impl AdbTransferEngine {
    /// Engine sharing `executor`'s device gate, with its helper in `helper_dir`.
    pub fn new(executor: Arc<CommandExecutor>, helper_dir: impl Into<std::path::PathBuf>) -> Self {
        let helper = ProgressHelper::new(helper_dir, executor.runner());
        Self { executor, helper }
    }

    /// Progress helper used by this engine.
    #[must_use]
    pub const fn helper(&self) -> &ProgressHelper {
        &self.helper
    }

    fn invocation(&self, request: &TransferRequest) -> Invocation {
        let base = self.executor.device_invocation(
            &request.device_id,
            [
                request.direction.as_str(),
                request.source.full_path(),
                request.destination.full_path(),
            ],
        );
        match (&request.progress_file, self.helper.script_path()) {
            (Some(progress_file), Some(script)) => Invocation::new(script)
                .arg(progress_file)
                .arg(self.executor.adb_path())
                .args(base.args),
            _ => base,
        }
    }
}

#[async_trait]
impl TransferEngine for AdbTransferEngine {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<TransferOutcome> {
        let operation = request.direction.as_str();
        check_sides(operation, &request)?;

        let invocation = self.invocation(&request);
        let ticket = self.executor.reserve(&request.device_id);
        let output = match self.executor.run_gated(ticket, invocation, &cancel).await {
            Ok(output) => output,
            Err(ExecError::Interrupted) => {
                debug!(operation, id = %request.operation_id, "transfer interrupted");
                return Err(FsOpsError::Interrupted { operation }.into());
            }
            Err(err) => return Err(FsOpsError::from_exec(operation, err).into()),
        };

        if output.succeeded() {
            progress.report(1.0);
            info!(
                operation,
                id = %request.operation_id,
                source = request.source.full_path(),
                destination = request.destination.full_path(),
                "transfer finished"
            );
            return Ok(TransferOutcome {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        let mut stderr = output.stderr;
        if stderr.trim().is_empty() {
            stderr = match &request.progress_file {
                Some(file) => captured_diagnostics(file).await,
                None => output.stdout,
            };
        }
        Ok(TransferOutcome {
            exit_code: output.exit_code,
            stderr,
        })
    }

    async fn deploy_progress_helper(&self) -> anyhow::Result<()> {
        self.helper.deploy().await?;
        Ok(())
    }
}

/// Last `[ NN%]` marker in `output`, as a fraction.
#[must_use]
pub fn parse_progress_output(output: &str) -> Option<f64> {
    output.rsplit('[').find_map(|chunk| {
        let (inside, _) = chunk.split_once("%]")?;
        let percent: u8 = inside.trim().parse().ok()?;
        (percent <= 100).then(|| f64::from(percent) / 100.0)
    })
}

// Under the helper the tool's stderr shares the terminal stream with progress.
async fn captured_diagnostics(progress_file: &Path) -> String {
    let captured = tokio::fs::read_to_string(progress_file)
        .await
        .unwrap_or_default();
    captured
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && parse_progress_output(line).is_none())
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_sides(operation: &'static str, request: &TransferRequest) -> FsOpsResult<()> {
    let (remote, host) = match request.direction {
        TransferDirection::Push => (&request.destination, &request.source),
        TransferDirection::Pull => (&request.source, &request.destination),
    };
    let reason = if host.kind() != PathKind::Host {
        Some((host, "expected a host path"))
    } else if remote.kind() != PathKind::Remote {
        Some((remote, "expected a remote path"))
    } else if remote.device_id() != Some(request.device_id.as_str()) {
        Some((remote, "path belongs to a different device"))
    } else {
        None
    };
    match reason {
        None => Ok(()),
        Some((path, reason)) => Err(invalid(operation, path, reason)),
    }
}

fn invalid(operation: &'static str, path: &FsPath, reason: &'static str) -> FsOpsError {
    FsOpsError::invalid_path(
        operation,
        CoreError::InvalidPath {
            operation,
            path: path.full_path().to_string(),
            reason,
        },
    )
}
