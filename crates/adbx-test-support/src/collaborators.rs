//! In-memory directory listing and device registry.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use adbx_core::{DeviceRegistry, DirectoryListing, FileEntry, FsPath, Relation};
use async_trait::async_trait;

/// Listing read model seeded by the test and recording notifications.
#[derive(Debug, Default)]
pub struct InMemoryListing {
    entries: Mutex<BTreeMap<String, Vec<FileEntry>>>,
    displayed: Mutex<Option<FsPath>>,
    notifications: Mutex<Vec<(FsPath, Relation)>>,
}

impl InMemoryListing {
    /// Empty listing with nothing displayed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing displaying `directory`.
    #[must_use]
    pub fn showing(directory: FsPath) -> Self {
        let listing = Self::new();
        listing.show(directory);
        listing
    }

    /// Change the displayed directory.
    pub fn show(&self, directory: FsPath) {
        *self.displayed.lock().unwrap_or_else(PoisonError::into_inner) = Some(directory);
    }

    /// Add `entry` under its parent directory.
    pub fn insert(&self, entry: FileEntry) {
        let key = entry
            .path()
            .parent()
            .map_or_else(|_| entry.path().full_path().to_string(), |parent| parent.full_path().to_string());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(entry);
    }

    /// Notifications received so far, in order.
    #[must_use]
    pub fn notifications(&self) -> Vec<(FsPath, Relation)> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DirectoryListing for InMemoryListing {
    async fn entries_under(&self, path: &FsPath) -> anyhow::Result<Vec<FileEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.full_path())
            .cloned()
            .unwrap_or_default())
    }

    fn displayed_path(&self) -> Option<FsPath> {
        self.displayed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify_affected(&self, path: &FsPath, relation: Relation) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.clone(), relation));
    }
}

/// Registry whose current device the test controls.
#[derive(Debug, Default)]
pub struct FixedDeviceRegistry {
    current: Mutex<Option<String>>,
}

impl FixedDeviceRegistry {
    /// Registry with `device_id` selected.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(Some(device_id.into())),
        }
    }

    /// Registry with no device selected.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Select `device_id`, or none.
    pub fn select(&self, device_id: Option<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = device_id;
    }
}

impl DeviceRegistry for FixedDeviceRegistry {
    fn current_device_id(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
