//! Recycle bin built from renames into a per-device recycle root.
//!
//! # Design
//! - Trash and restore are ordinary queue moves; the metadata needed to undo a
//!   trash lives in the trashed item's own filename.
//! - Reserved index names under the root are skipped, never trashed.
//! - Everything is validated before the first move is submitted.

use std::collections::HashSet;
use std::sync::Arc;

use adbx_core::{
    CoreError, DeviceRegistry, DirectoryListing, FileEntry, FsPath, OperationRequest, PathKind,
    RecycleIndexEntry, Relation,
};
use adbx_fsops::RemoteFileOps;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{QueueError, RecycleError, RecycleResult};
use crate::queue::{OperationHandle, OperationQueue};

/// Recycle root location and reserved names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecycleSettings {
    /// Absolute remote directory holding trashed items.
    pub root: String,
    /// Names under the root that are never trashed or listed.
    pub index_names: Vec<String>,
}

/// Coordinates trash and restore on top of the operation queue.
#[derive(Clone)]
pub struct RecycleCoordinator {
    queue: OperationQueue,
    fsops: RemoteFileOps,
    devices: Arc<dyn DeviceRegistry>,
    listing: Option<Arc<dyn DirectoryListing>>,
    settings: RecycleSettings,
}

impl RecycleCoordinator {
    /// Coordinator submitting to `queue`.
    #[must_use]
    pub fn new(
        queue: OperationQueue,
        fsops: RemoteFileOps,
        devices: Arc<dyn DeviceRegistry>,
        listing: Option<Arc<dyn DirectoryListing>>,
        settings: RecycleSettings,
    ) -> Self {
        Self {
            queue,
            fsops,
            devices,
            listing,
            settings,
        }
    }

    /// Recycle root on `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RecycleError::InvalidPath`] when the configured root is not
    /// a valid remote directory.
    pub fn root(&self, device_id: &str) -> RecycleResult<FsPath> {
        FsPath::remote(device_id, &self.settings.root, true)
            .map_err(|source| RecycleError::InvalidPath { source })
    }

    fn is_index_entry(&self, root: &FsPath, path: &FsPath) -> bool {
        self.settings
            .index_names
            .iter()
            .any(|name| name == path.full_name())
            && path.parent().is_ok_and(|parent| parent == *root)
    }

    /// Move `items`, listed in `current_path`, into the recycle root.
    ///
    /// `current_path` and the deletion time are encoded into each new name.
    /// Reserved index files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RecycleError::InvalidPath`] when an item already lives under
    /// the recycle root, is not a direct child of `current_path`, or would get
    /// a recycle name too long for the device, and remote or queue errors from
    /// creating the root and submitting the moves.
    pub async fn trash(
        &self,
        items: &[FsPath],
        current_path: &FsPath,
    ) -> RecycleResult<Vec<OperationHandle>> {
        let device_id = remote_device(current_path)?;
        let root = self.root(device_id)?;
        let current_path = current_path.as_directory(true);

        let mut planned = Vec::with_capacity(items.len());
        let deleted_at = Utc::now();
        for item in items {
            if self.is_index_entry(&root, item) {
                debug!(path = item.full_path(), "skipping recycle index entry");
                continue;
            }
            if item.device_id() != Some(device_id) {
                return Err(invalid("trash", item, "item is not on the current device"));
            }
            match root.relation_from(item) {
                Relation::SelfPath | Relation::Descendant => {
                    return Err(invalid("trash", item, "item is already in the recycle bin"));
                }
                Relation::Ancestor => {
                    return Err(invalid("trash", item, "item contains the recycle bin"));
                }
                Relation::Unrelated => {}
            }
            if item.parent().ok().as_ref() != Some(&current_path) {
                return Err(invalid("trash", item, "item is not in the current directory"));
            }
            let entry = RecycleIndexEntry::new(current_path.clone(), item.full_name(), deleted_at)
                .map_err(|source| RecycleError::InvalidPath { source })?;
            let destination = root
                .join(&entry.encode(), item.is_directory())
                .map_err(|source| RecycleError::InvalidPath { source })?;
            planned.push(OperationRequest::move_to(item.clone(), destination).on_device(device_id));
        }
        if planned.is_empty() {
            return Ok(Vec::new());
        }

        self.fsops
            .make_dir(self.fsops.reserve(device_id), &root, &CancellationToken::new())
            .await?;
        let handles = planned
            .into_iter()
            .map(|request| self.queue.submit(request))
            .collect::<Result<Vec<_>, QueueError>>()?;
        info!(count = handles.len(), device = device_id, "items moved to recycle bin");
        Ok(handles)
    }

    /// Move trashed `items` back to where they came from.
    ///
    /// # Errors
    ///
    /// Returns [`RecycleError::CorruptTrashEntry`] when a name does not
    /// decode, [`RecycleError::RestoreConflict`] when the original location is
    /// taken, either on the device or by another item in the same call, and
    /// remote or queue errors from the calls involved.
    pub async fn restore(&self, items: &[FileEntry]) -> RecycleResult<Vec<OperationHandle>> {
        let mut planned = Vec::with_capacity(items.len());
        let mut claimed = HashSet::with_capacity(items.len());
        for item in items {
            let path = item.path();
            let device_id = remote_device(path)?;
            let origin = match item.trash_origin() {
                Some(origin) => origin.clone(),
                None => RecycleIndexEntry::decode(path.full_name(), device_id)
                    .map_err(|source| RecycleError::corrupt(path.full_name(), source))?,
            };
            let destination = origin
                .original_path(path.is_directory())
                .map_err(|source| RecycleError::InvalidPath { source })?;
            if !claimed.insert((device_id, destination.full_path().to_string())) {
                return Err(RecycleError::RestoreConflict {
                    path: destination.full_path().to_string(),
                });
            }
            planned.push((item, device_id, origin, destination));
        }

        let mut requests = Vec::with_capacity(planned.len());
        for (item, device_id, origin, destination) in planned {
            let parent = origin.original_parent();
            self.fsops
                .make_dir(self.fsops.reserve(device_id), parent, &CancellationToken::new())
                .await?;
            let existing = self.entries_under(device_id, parent).await?;
            if existing
                .iter()
                .any(|entry| entry.path().full_name() == origin.original_name())
            {
                return Err(RecycleError::RestoreConflict {
                    path: destination.full_path().to_string(),
                });
            }
            requests.push(OperationRequest::move_to(item, destination).on_device(device_id));
        }

        let handles = requests
            .into_iter()
            .map(|request| self.queue.submit(request))
            .collect::<Result<Vec<_>, QueueError>>()?;
        info!(count = handles.len(), "items restored from recycle bin");
        Ok(handles)
    }

    /// Decoded entries currently in the recycle root of the selected device.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoDevice`] (wrapped) when no device is selected
    /// and remote errors from creating or listing the root.
    pub async fn trashed_entries(&self) -> RecycleResult<Vec<FileEntry>> {
        let device_id = self.current_device()?;
        let root = self.root(&device_id)?;
        self.fsops
            .make_dir(self.fsops.reserve(&device_id), &root, &CancellationToken::new())
            .await?;
        let entries = self
            .fsops
            .list_dir(self.fsops.reserve(&device_id), &root, &CancellationToken::new())
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !self.is_index_entry(&root, entry.path()))
            .collect())
    }

    /// Permanently delete everything in the recycle root with one `rm -rf`.
    ///
    /// Returns the number of items removed.
    ///
    /// # Errors
    ///
    /// See [`RecycleCoordinator::trashed_entries`].
    pub async fn empty(&self) -> RecycleResult<usize> {
        let entries = self.trashed_entries().await?;
        if entries.is_empty() {
            return Ok(0);
        }
        let device_id = self.current_device()?;
        let paths: Vec<FsPath> = entries.iter().map(|entry| entry.path().clone()).collect();
        self.fsops
            .delete(
                self.fsops.reserve(&device_id),
                &paths,
                true,
                &CancellationToken::new(),
            )
            .await?;
        info!(count = paths.len(), device = %device_id, "recycle bin emptied");
        Ok(paths.len())
    }

    async fn entries_under(&self, device_id: &str, parent: &FsPath) -> RecycleResult<Vec<FileEntry>> {
        match &self.listing {
            Some(listing) => listing
                .entries_under(parent)
                .await
                .map_err(RecycleError::listing),
            None => Ok(self
                .fsops
                .list_dir(self.fsops.reserve(device_id), parent, &CancellationToken::new())
                .await?),
        }
    }

    fn current_device(&self) -> RecycleResult<String> {
        self.devices
            .current_device_id()
            .ok_or(RecycleError::Queue {
                source: QueueError::NoDevice,
            })
    }
}

fn remote_device(path: &FsPath) -> RecycleResult<&str> {
    match (path.kind(), path.device_id()) {
        (PathKind::Remote, Some(device_id)) => Ok(device_id),
        _ => Err(invalid("recycle", path, "recycle bin holds remote items only")),
    }
}

fn invalid(operation: &'static str, path: &FsPath, reason: &'static str) -> RecycleError {
    RecycleError::InvalidPath {
        source: CoreError::InvalidPath {
            operation,
            path: path.full_path().to_string(),
            reason,
        },
    }
}
