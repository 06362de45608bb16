//! Command execution against the external device tool.
//!
//! # Design
//! - Queries (`devices -l`, `version`) run ungated and may overlap.
//! - Device-targeted calls hold a [`DevicePermit`] from the per-device FIFO
//!   gate for the whole subprocess lifetime.
//! - Waiting for the gate and running the process both honour cancellation.
//! - Nothing here retries or applies timeouts.

mod devices;
mod escape;
mod gate;
mod runner;
mod version;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use devices::{DeviceInfo, DeviceState, parse_devices};
pub use escape::{ShellCommand, escape_shell_arg};
pub use gate::{DeviceGate, DevicePermit, DeviceTicket};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner};
pub use version::{AdbVersion, MIN_ADB_VERSION, parse_version};

use crate::error::{ExecError, ExecResult};

/// Invokes the external tool, serializing device-targeted calls per device.
pub struct CommandExecutor {
    adb: PathBuf,
    runner: Arc<dyn CommandRunner>,
    gate: DeviceGate,
}

impl CommandExecutor {
    /// Executor running `adb` through `runner`.
    pub fn new(adb: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            adb: adb.into(),
            runner,
            gate: DeviceGate::new(),
        }
    }

    /// Path of the external tool.
    #[must_use]
    pub fn adb_path(&self) -> &Path {
        &self.adb
    }

    /// Runner used for every subprocess.
    #[must_use]
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    /// Reserve the next place in `device_id`'s line.
    #[must_use]
    pub fn reserve(&self, device_id: &str) -> DeviceTicket {
        self.gate.reserve(device_id)
    }

    /// Invocation of the tool targeting `device_id` with `args`.
    #[must_use]
    pub fn device_invocation<I, S>(&self, device_id: &str, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Invocation::new(&self.adb)
            .arg("-s")
            .arg(device_id)
            .args(args)
    }

    /// Run an ungated query such as `devices -l`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailed`] on non-zero exit and spawn/IO
    /// errors from the runner.
    pub async fn query(&self, args: &[&str], cancel: &CancellationToken) -> ExecResult<CommandOutput> {
        let invocation = Invocation::new(&self.adb).args(args.iter().copied());
        self.run(invocation, cancel.clone()).await?.into_checked()
    }

    /// List attached devices.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::query`].
    pub async fn list_devices(&self) -> ExecResult<Vec<DeviceInfo>> {
        let output = self
            .query(&["devices", "-l"], &CancellationToken::new())
            .await?;
        Ok(parse_devices(&output.stdout))
    }

    /// Release of the tool, or `None` when `adb version` prints no
    /// recognizable version.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::query`]; a missing tool surfaces as a spawn error.
    pub async fn version(&self) -> ExecResult<Option<AdbVersion>> {
        let output = self.query(&["version"], &CancellationToken::new()).await?;
        Ok(parse_version(&output.stdout))
    }

    /// Run `command` in the device shell once `ticket` is served.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailed`] on non-zero exit,
    /// [`ExecError::Interrupted`] when canceled, and spawn/IO errors.
    pub async fn shell(
        &self,
        ticket: DeviceTicket,
        command: &ShellCommand,
        cancel: &CancellationToken,
    ) -> ExecResult<CommandOutput> {
        let invocation =
            self.device_invocation(ticket.device_id(), ["shell".to_string(), command.render()]);
        self.run_gated(ticket, invocation, cancel).await?.into_checked()
    }

    /// Run an arbitrary invocation once `ticket` is served, without
    /// translating the exit code.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Interrupted`] when canceled while waiting or
    /// running, and spawn/IO errors from the runner.
    pub async fn run_gated(
        &self,
        ticket: DeviceTicket,
        invocation: Invocation,
        cancel: &CancellationToken,
    ) -> ExecResult<CommandOutput> {
        let permit = tokio::select! {
            permit = ticket.acquire() => permit,
            () = cancel.cancelled() => return Err(ExecError::Interrupted),
        };
        let output = self.run(invocation, cancel.clone()).await;
        drop(permit);
        output
    }

    async fn run(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
    ) -> ExecResult<CommandOutput> {
        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args_lossy(),
            "invoking external tool"
        );
        let output = self.runner.run(invocation, cancel).await?;
        debug!(exit_code = ?output.exit_code, "external tool finished");
        Ok(output)
    }
}
