//! Engine construction, device selection, and CLI error types.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use adbx_config::EngineConfig;
use adbx_core::{DeviceRegistry as _, FileEntry, FsPath};
use adbx_fsops::{CommandRunner, MIN_ADB_VERSION, ProcessRunner};
use adbx_queue::{Engine, EngineCollaborators, SelectedDevice};
use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::OutputFormat;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Everything a command handler needs.
pub(crate) struct AppContext {
    pub(crate) engine: Engine,
    pub(crate) devices: Arc<SelectedDevice>,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the engine against the real tool.
    pub(crate) async fn connect(
        config: EngineConfig,
        device: Option<String>,
        output: OutputFormat,
    ) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner), device, output).await
    }

    pub(crate) async fn with_runner(
        config: EngineConfig,
        runner: Arc<dyn CommandRunner>,
        device: Option<String>,
        output: OutputFormat,
    ) -> Self {
        let devices = Arc::new(SelectedDevice::new(device));
        let engine = Engine::build(
            config,
            EngineCollaborators::new(runner, Arc::clone(&devices) as Arc<dyn adbx_core::DeviceRegistry>),
        )
        .await;
        Self {
            engine,
            devices,
            output,
        }
    }

    /// Refuse to run against a missing or outdated tool.
    pub(crate) fn ensure_tool(&self) -> CliResult<()> {
        if self.engine.tool_supported() {
            return Ok(());
        }
        let adb = self.engine.executor().adb_path().display().to_string();
        Err(CliError::validation(match self.engine.adb_version() {
            Some(found) => {
                format!("{adb}: version {found} is older than the required {MIN_ADB_VERSION}")
            }
            None => format!("{adb}: not found or not an adb binary; version {MIN_ADB_VERSION} or newer is required"),
        }))
    }

    /// Device commands target: the one given on the command line, or the
    /// only online device attached.
    pub(crate) async fn device(&self) -> CliResult<String> {
        if let Some(device) = self.devices.current_device_id() {
            return Ok(device);
        }
        let attached = self
            .engine
            .executor()
            .list_devices()
            .await
            .map_err(CliError::failure)?;
        let mut online = attached.into_iter().filter(|device| device.is_online());
        match (online.next(), online.next()) {
            (Some(device), None) => {
                debug!(device = %device.id, "using the only attached device");
                self.devices.select(Some(device.id.clone()));
                Ok(device.id)
            }
            (None, _) => Err(CliError::validation("no device attached")),
            (Some(_), Some(_)) => Err(CliError::validation(
                "more than one device attached; pass --device",
            )),
        }
    }

    /// Remote path on the target device.
    pub(crate) async fn remote(&self, raw: &str, is_directory: bool) -> CliResult<FsPath> {
        let device = self.device().await?;
        FsPath::remote(&device, raw, is_directory)
            .map_err(|err| CliError::validation(format!("{raw}: {}", err.label())))
    }

    /// Look `raw` up in its parent's listing to learn its type and size.
    pub(crate) async fn stat(&self, raw: &str) -> CliResult<FileEntry> {
        let path = self.remote(raw, false).await?;
        let parent = path
            .parent()
            .map_err(|err| CliError::validation(format!("{raw}: {}", err.label())))?;
        let fsops = self.engine.fsops();
        let device = self.device().await?;
        let entries = fsops
            .list_dir(fsops.reserve(&device), &parent, &CancellationToken::new())
            .await
            .map_err(|err| CliError::failure(anyhow!(err.user_message())))?;
        entries
            .into_iter()
            .find(|entry| entry.path().full_name() == path.full_name())
            .ok_or_else(|| CliError::validation(format!("{raw}: no such file or directory")))
    }
}

/// Host path, typed by what is on disk.
pub(crate) fn host_source(raw: &str) -> CliResult<(FsPath, Option<u64>)> {
    let metadata = std::fs::metadata(raw)
        .map_err(|err| CliError::validation(format!("{raw}: {err}")))?;
    let path = FsPath::host(raw, metadata.is_dir())
        .map_err(|err| CliError::validation(format!("{raw}: {}", err.label())))?;
    Ok((path, metadata.is_file().then(|| metadata.len())))
}

/// Host directory receiving pulled items; created when missing.
pub(crate) fn host_directory(raw: &str) -> CliResult<FsPath> {
    if !Path::new(raw).is_dir() {
        std::fs::create_dir_all(raw)
            .map_err(|err| CliError::failure(anyhow!("cannot create {raw}: {err}")))?;
    }
    FsPath::host(raw, true).map_err(|err| CliError::validation(format!("{raw}: {}", err.label())))
}
