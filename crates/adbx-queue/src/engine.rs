//! Composition root wiring configuration and collaborators into one engine.
//!
//! # Design
//! - One `Engine` per application lifetime; tests build a fresh one per case.
//! - Side-channel progress needs the helper; when deployment fails the engine
//!   falls back to estimates, logs a warning, and publishes `ProgressFallback`.
//! - The tool's release is checked once at build. A missing or outdated tool
//!   is reported through `ToolUnsupported`; callers decide whether to go on.

use std::sync::{Arc, Mutex, PoisonError};

use adbx_config::{EngineConfig, ProgressMethod};
use adbx_core::{DeviceRegistry, DirectoryListing, TransferEngine};
use adbx_events::{Event, EventBus};
use adbx_fsops::{
    AdbTransferEngine, AdbVersion, CommandExecutor, CommandRunner, MIN_ADB_VERSION, RemoteFileOps,
};
use tracing::{info, warn};

use crate::progress::{ProgressStrategy, ProgressTracker};
use crate::queue::{OperationQueue, QueueParts};
use crate::recycle::{RecycleCoordinator, RecycleSettings};

/// Device registry holding an explicitly chosen device.
#[derive(Debug, Default)]
pub struct SelectedDevice {
    current: Mutex<Option<String>>,
}

impl SelectedDevice {
    /// Registry with `device_id` selected, if any.
    #[must_use]
    pub const fn new(device_id: Option<String>) -> Self {
        Self {
            current: Mutex::new(device_id),
        }
    }

    /// Change the selected device.
    pub fn select(&self, device_id: Option<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = device_id;
    }
}

impl DeviceRegistry for SelectedDevice {
    fn current_device_id(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// External collaborators handed to [`Engine::build`].
pub struct EngineCollaborators {
    /// Process runner used for every tool invocation.
    pub runner: Arc<dyn CommandRunner>,
    /// Source of the default device.
    pub devices: Arc<dyn DeviceRegistry>,
    /// Listing read model, if one is displayed.
    pub listing: Option<Arc<dyn DirectoryListing>>,
    /// Byte mover; defaults to the tool's own push/pull.
    pub transfers: Option<Arc<dyn TransferEngine>>,
}

impl EngineCollaborators {
    /// Collaborators with no listing and the default transfer engine.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, devices: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            runner,
            devices,
            listing: None,
            transfers: None,
        }
    }

    /// Notify `listing` when operations finish.
    #[must_use]
    pub fn with_listing(mut self, listing: Arc<dyn DirectoryListing>) -> Self {
        self.listing = Some(listing);
        self
    }

    /// Use `transfers` instead of the tool's push/pull.
    #[must_use]
    pub fn with_transfer_engine(mut self, transfers: Arc<dyn TransferEngine>) -> Self {
        self.transfers = Some(transfers);
        self
    }
}

/// Fully wired operation engine.
pub struct Engine {
    config: EngineConfig,
    executor: Arc<CommandExecutor>,
    adb_version: Option<AdbVersion>,
    fsops: RemoteFileOps,
    events: EventBus,
    progress: ProgressTracker,
    queue: OperationQueue,
    recycle: RecycleCoordinator,
}

impl Engine {
    /// Build every component from `config`.
    pub async fn build(config: EngineConfig, collaborators: EngineCollaborators) -> Self {
        let EngineCollaborators {
            runner,
            devices,
            listing,
            transfers,
        } = collaborators;

        let executor = Arc::new(CommandExecutor::new(&config.adb_path, runner));
        let fsops = RemoteFileOps::new(Arc::clone(&executor)).with_recycle_root(&config.recycle_root);
        let transfers: Arc<dyn TransferEngine> = transfers.unwrap_or_else(|| {
            Arc::new(AdbTransferEngine::new(
                Arc::clone(&executor),
                &config.helper_dir,
            ))
        });
        let events = EventBus::with_capacity(config.event_replay_capacity);
        let adb_version = check_tool(&executor, &events).await;

        let strategy = match config.progress_method {
            ProgressMethod::Estimate => ProgressStrategy::Estimate,
            ProgressMethod::SideChannel => match transfers.deploy_progress_helper().await {
                Ok(()) => ProgressStrategy::SideChannel {
                    dir: config.helper_dir.clone(),
                },
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(error = %message, "progress helper unavailable; estimating transfer progress");
                    events.publish(Event::ProgressFallback { message });
                    ProgressStrategy::Estimate
                }
            },
        };
        let progress = ProgressTracker::new(
            strategy,
            config.progress_poll_interval(),
            config.estimate_throughput_bps,
        );

        let queue = OperationQueue::new(QueueParts {
            fsops: fsops.clone(),
            transfers,
            devices: Arc::clone(&devices),
            listing: listing.clone(),
            events: events.clone(),
            progress: progress.clone(),
            transfer_concurrency: config.transfer_concurrency,
        });
        let recycle = RecycleCoordinator::new(
            queue.clone(),
            fsops.clone(),
            devices,
            listing,
            RecycleSettings {
                root: config.recycle_root.clone(),
                index_names: config.recycle_index_names.clone(),
            },
        );
        info!(
            adb = %config.adb_path.display(),
            transfer_concurrency = config.transfer_concurrency,
            progress = progress.strategy().as_str(),
            "engine ready"
        );

        Self {
            config,
            executor,
            adb_version,
            fsops,
            events,
            progress,
            queue,
            recycle,
        }
    }

    /// Configuration the engine was built from.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Command executor shared by every component.
    #[must_use]
    pub const fn executor(&self) -> &Arc<CommandExecutor> {
        &self.executor
    }

    /// Release reported by the tool at build, if it could be read.
    #[must_use]
    pub const fn adb_version(&self) -> Option<AdbVersion> {
        self.adb_version
    }

    /// Whether the tool was found and is recent enough.
    #[must_use]
    pub fn tool_supported(&self) -> bool {
        self.adb_version.is_some_and(AdbVersion::is_supported)
    }

    /// Remote file operations, for direct calls outside the queue.
    #[must_use]
    pub const fn fsops(&self) -> &RemoteFileOps {
        &self.fsops
    }

    /// Lifecycle event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Progress strategy in effect after helper deployment.
    #[must_use]
    pub const fn progress_strategy(&self) -> &ProgressStrategy {
        self.progress.strategy()
    }

    /// Operation queue.
    #[must_use]
    pub const fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Recycle coordinator.
    #[must_use]
    pub const fn recycle(&self) -> &RecycleCoordinator {
        &self.recycle
    }

    /// Cancel outstanding work and wait for it to drain.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

async fn check_tool(executor: &CommandExecutor, events: &EventBus) -> Option<AdbVersion> {
    let found = match executor.version().await {
        Ok(found) => found,
        Err(err) => {
            warn!(adb = %executor.adb_path().display(), error = %err, "device tool could not be run");
            None
        }
    };
    match found {
        Some(version) if version.is_supported() => {
            info!(version = %version, "device tool found");
        }
        _ => {
            let found_label = found.as_ref().map(ToString::to_string);
            warn!(
                found = found_label.as_deref().unwrap_or("none"),
                required = %MIN_ADB_VERSION,
                "device tool missing or too old"
            );
            events.publish(Event::ToolUnsupported {
                found: found_label,
                required: MIN_ADB_VERSION.to_string(),
            });
        }
    }
    found
}
