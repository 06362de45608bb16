#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use adbx_config::{EngineConfig, ProgressMethod};
use adbx_core::{DeviceRegistry, FsPath};
use adbx_events::{Event, EventEnvelope};
use adbx_queue::{Engine, EngineCollaborators};
use adbx_test_support::{FakeDevice, FakeTransferEngine, FixedDeviceRegistry, InMemoryListing};
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const DEVICE: &str = "emulator-5554";
pub const RECYCLE_ROOT: &str = "/sd/.trash";

pub struct Harness {
    pub device: Arc<FakeDevice>,
    transfers: Option<Arc<FakeTransferEngine>>,
    pub listing: Arc<InMemoryListing>,
    pub engine: Engine,
    pub scratch: TempDir,
}

/// Engine over a fresh device, moving bytes with `transfers`.
pub async fn harness(transfers: FakeTransferEngine, transfer_concurrency: usize) -> TestResult<Harness> {
    build(FakeDevice::new(DEVICE), Some(Arc::new(transfers)), transfer_concurrency).await
}

/// Engine whose transfers are real push/pull calls against the device, so
/// they share the device gate with administrative work.
pub async fn adb_harness(latency: Duration, transfer_concurrency: usize) -> TestResult<Harness> {
    build(FakeDevice::new(DEVICE).with_latency(latency), None, transfer_concurrency).await
}

async fn build(
    device: FakeDevice,
    transfers: Option<Arc<FakeTransferEngine>>,
    transfer_concurrency: usize,
) -> TestResult<Harness> {
    let scratch = tempfile::tempdir()?;
    let device = Arc::new(device);
    device.add_dir("/sd");
    let listing = Arc::new(InMemoryListing::new());
    let devices: Arc<dyn DeviceRegistry> = Arc::new(FixedDeviceRegistry::new(DEVICE));

    let config = EngineConfig {
        transfer_concurrency,
        progress_method: if transfers.is_some() {
            ProgressMethod::SideChannel
        } else {
            ProgressMethod::Estimate
        },
        progress_poll_ms: 5,
        recycle_root: RECYCLE_ROOT.to_string(),
        helper_dir: scratch.path().join("helper"),
        ..EngineConfig::default()
    };
    let mut collaborators =
        EngineCollaborators::new(device.clone(), devices).with_listing(listing.clone());
    if let Some(transfers) = &transfers {
        collaborators = collaborators.with_transfer_engine(transfers.clone());
    }
    let engine = Engine::build(config, collaborators).await;

    Ok(Harness {
        device,
        transfers,
        listing,
        engine,
        scratch,
    })
}

pub fn remote(path: &str, is_directory: bool) -> TestResult<FsPath> {
    Ok(FsPath::remote(DEVICE, path, is_directory)?)
}

impl Harness {
    pub fn transfers(&self) -> &FakeTransferEngine {
        self.transfers.as_deref().expect("harness built with a fake transfer engine")
    }

    pub fn host(&self, name: &str) -> TestResult<FsPath> {
        let path = self.scratch.path().join(name);
        Ok(FsPath::host(&path.to_string_lossy(), false)?)
    }

    /// Every event published so far.
    pub async fn events(&self) -> Vec<Event> {
        let Some(last) = self.engine.events().last_event_id() else {
            return Vec::new();
        };
        let mut stream = self.engine.events().subscribe(Some(0));
        let mut events = Vec::new();
        while let Ok(Some(EventEnvelope { id, event, .. })) =
            tokio::time::timeout(Duration::from_millis(200), stream.next()).await
        {
            events.push(event);
            if id >= last {
                break;
            }
        }
        events
    }
}
