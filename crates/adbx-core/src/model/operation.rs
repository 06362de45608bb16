//! Operation requests and the snapshots the queue publishes for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::FileEntry;
use super::path::{FsPath, PathKind};
use crate::error::{CoreError, CoreResult};

/// Identifier assigned to each submitted operation.
pub type OperationId = Uuid;

/// Kind of work an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Copy a host file or directory onto the device.
    Push,
    /// Copy a device file or directory onto the host.
    Pull,
    /// Move a remote item to a new full path.
    Move,
    /// Recursively delete a remote item.
    Delete,
    /// Create a remote directory (and its parents).
    MakeDir,
    /// Rename a remote item within its directory.
    Rename,
    /// Create or append to a remote text file.
    Write,
}

/// Scheduling lane an operation kind is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Metadata-only work dispatched immediately.
    Administrative,
    /// Byte transfers drawn from the wait list by bounded workers.
    Transfer,
}

impl OperationKind {
    /// Lane this kind is scheduled through.
    #[must_use]
    pub const fn lane(self) -> Lane {
        match self {
            Self::Push | Self::Pull => Lane::Transfer,
            Self::Move | Self::Delete | Self::MakeDir | Self::Rename | Self::Write => {
                Lane::Administrative
            }
        }
    }

    /// Whether the kind needs a destination path.
    #[must_use]
    pub const fn requires_destination(self) -> bool {
        matches!(self, Self::Push | Self::Pull | Self::Move | Self::Rename)
    }

    /// Lowercase label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::MakeDir => "make_dir",
            Self::Rename => "rename",
            Self::Write => "write",
        }
    }
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Accepted but not dispatched yet.
    Waiting,
    /// Dispatched to a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Canceled before or during execution.
    Canceled,
}

impl OperationStatus {
    /// Whether the status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Running | Self::Canceled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Canceled)
        )
    }

    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// Content written by a [`OperationKind::Write`] operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WritePayload {
    /// Create an empty file (or bump its timestamp).
    Touch,
    /// Append one line of text.
    AppendLine {
        /// Line to append, without a trailing newline.
        text: String,
    },
}

/// Item an operation acts on, with its size when the listing reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSource {
    /// Location of the item.
    pub path: FsPath,
    /// Size in bytes, used for transfer progress estimates.
    pub size: Option<u64>,
}

impl From<FsPath> for OperationSource {
    fn from(path: FsPath) -> Self {
        Self { path, size: None }
    }
}

impl From<&FileEntry> for OperationSource {
    fn from(entry: &FileEntry) -> Self {
        Self {
            path: entry.path().clone(),
            size: entry.size(),
        }
    }
}

/// Request for a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Kind of work to perform.
    pub kind: OperationKind,
    /// Item the operation acts on.
    pub source: OperationSource,
    /// Full target path for kinds that need one.
    pub destination: Option<FsPath>,
    /// Content for write operations.
    pub write: Option<WritePayload>,
    /// Device override; the registry's current device is used when absent.
    pub device_id: Option<String>,
}

impl OperationRequest {
    fn new(kind: OperationKind, source: impl Into<OperationSource>) -> Self {
        Self {
            kind,
            source: source.into(),
            destination: None,
            write: None,
            device_id: None,
        }
    }

    /// Push a host item to a full remote target path.
    #[must_use]
    pub fn push(source: impl Into<OperationSource>, destination: FsPath) -> Self {
        Self {
            destination: Some(destination),
            ..Self::new(OperationKind::Push, source)
        }
    }

    /// Pull a remote item to a full host target path.
    #[must_use]
    pub fn pull(source: impl Into<OperationSource>, destination: FsPath) -> Self {
        Self {
            destination: Some(destination),
            ..Self::new(OperationKind::Pull, source)
        }
    }

    /// Move a remote item to a full remote target path.
    #[must_use]
    pub fn move_to(source: impl Into<OperationSource>, destination: FsPath) -> Self {
        Self {
            destination: Some(destination),
            ..Self::new(OperationKind::Move, source)
        }
    }

    /// Rename a remote item within its directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when `new_name` is not a valid segment
    /// or the source is a root.
    pub fn rename(source: impl Into<OperationSource>, new_name: &str) -> CoreResult<Self> {
        let source = source.into();
        let destination = source.path.with_name(new_name)?;
        Ok(Self {
            destination: Some(destination),
            ..Self::new(OperationKind::Rename, source)
        })
    }

    /// Recursively delete a remote item.
    #[must_use]
    pub fn delete(source: impl Into<OperationSource>) -> Self {
        Self::new(OperationKind::Delete, source)
    }

    /// Create a remote directory.
    #[must_use]
    pub fn make_dir(path: FsPath) -> Self {
        Self::new(OperationKind::MakeDir, path.as_directory(true))
    }

    /// Write to a remote file.
    #[must_use]
    pub fn write(path: FsPath, payload: WritePayload) -> Self {
        Self {
            write: Some(payload),
            ..Self::new(OperationKind::Write, path.as_directory(false))
        }
    }

    /// Target a specific device instead of the registry's current one.
    #[must_use]
    pub fn on_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Check the request's shape before it is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when a required destination is missing,
    /// a path is on the wrong filesystem, or a move would place an item inside
    /// itself.
    pub fn validate(&self) -> CoreResult<()> {
        let source = &self.source.path;
        let (source_kind, destination_kind) = match self.kind {
            OperationKind::Push => (PathKind::Host, Some(PathKind::Remote)),
            OperationKind::Pull => (PathKind::Remote, Some(PathKind::Host)),
            OperationKind::Move | OperationKind::Rename => {
                (PathKind::Remote, Some(PathKind::Remote))
            }
            OperationKind::Delete | OperationKind::MakeDir | OperationKind::Write => {
                (PathKind::Remote, None)
            }
        };
        if source.kind() != source_kind {
            return Err(CoreError::invalid_path(
                self.kind.as_str(),
                source.full_path(),
                "source is on the wrong filesystem",
            ));
        }
        if source_kind == PathKind::Remote && source.is_root() {
            return Err(CoreError::invalid_path(
                self.kind.as_str(),
                source.full_path(),
                "operation cannot target the root",
            ));
        }

        match (destination_kind, &self.destination) {
            (Some(_), None) => Err(CoreError::invalid_path(
                self.kind.as_str(),
                source.full_path(),
                "destination is required",
            )),
            (Some(kind), Some(destination)) if destination.kind() != kind => {
                Err(CoreError::invalid_path(
                    self.kind.as_str(),
                    destination.full_path(),
                    "destination is on the wrong filesystem",
                ))
            }
            (Some(PathKind::Remote), Some(destination))
                if source_kind == PathKind::Remote
                    && source.relation_from(destination).requires_refresh() =>
            {
                Err(CoreError::invalid_path(
                    self.kind.as_str(),
                    destination.full_path(),
                    "cannot move an item into itself",
                ))
            }
            (None, Some(destination)) => Err(CoreError::invalid_path(
                self.kind.as_str(),
                destination.full_path(),
                "operation does not take a destination",
            )),
            _ if self.kind == OperationKind::Write && self.write.is_none() => {
                Err(CoreError::invalid_path(
                    self.kind.as_str(),
                    source.full_path(),
                    "write payload is required",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Many items sharing one kind and one destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Kind applied to every item.
    pub kind: OperationKind,
    /// Items in submission order.
    pub sources: Vec<OperationSource>,
    /// Directory receiving the items for kinds that need a destination.
    pub destination_dir: Option<FsPath>,
    /// Device override applied to every item.
    pub device_id: Option<String>,
}

impl BatchRequest {
    /// Expand into one independent request per item.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedBatch`] for kinds without a batch form and
    /// [`CoreError::InvalidPath`] when a destination is needed but missing or an
    /// item name cannot be joined.
    pub fn expand(self) -> CoreResult<Vec<OperationRequest>> {
        let Self {
            kind,
            sources,
            destination_dir,
            device_id,
        } = self;
        let target_for = |source: &OperationSource| -> CoreResult<FsPath> {
            let dir = destination_dir.as_ref().ok_or_else(|| {
                CoreError::invalid_path(
                    kind.as_str(),
                    source.path.full_path(),
                    "batch destination is required",
                )
            })?;
            dir.join(source.path.full_name(), source.path.is_directory())
        };

        sources
            .into_iter()
            .map(|source| {
                let request = match kind {
                    OperationKind::Push => {
                        let target = target_for(&source)?;
                        OperationRequest::push(source, target)
                    }
                    OperationKind::Pull => {
                        let target = target_for(&source)?;
                        OperationRequest::pull(source, target)
                    }
                    OperationKind::Move => {
                        let target = target_for(&source)?;
                        OperationRequest::move_to(source, target)
                    }
                    OperationKind::Delete => OperationRequest::delete(source),
                    OperationKind::MakeDir => OperationRequest::make_dir(source.path),
                    OperationKind::Rename | OperationKind::Write => {
                        return Err(CoreError::UnsupportedBatch { kind });
                    }
                };
                Ok(OperationRequest {
                    device_id: device_id.clone(),
                    ..request
                })
            })
            .collect()
    }
}

/// Status, progress, and error published together for an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    /// Lifecycle status.
    pub status: OperationStatus,
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Failure text, present iff the status is `Failed`.
    pub error: Option<String>,
    /// When a worker picked the operation up.
    pub started_at: Option<DateTime<Utc>>,
    /// When the operation reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationState {
    /// Initial state of a freshly submitted operation.
    #[must_use]
    pub const fn waiting() -> Self {
        Self {
            status: OperationStatus::Waiting,
            progress: 0.0,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::waiting()
    }
}

/// Read-only view of an operation handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    /// Operation identifier.
    pub id: OperationId,
    /// Kind of work.
    pub kind: OperationKind,
    /// Device the operation targets.
    pub device_id: String,
    /// Item the operation acts on.
    pub source: FsPath,
    /// Full target path, when the kind has one.
    pub destination: Option<FsPath>,
    /// When the queue accepted the operation.
    pub submitted_at: DateTime<Utc>,
    /// Live state at the time of the snapshot.
    #[serde(flatten)]
    pub state: OperationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

    fn remote(raw: &str, is_directory: bool) -> FsPath {
        FsPath::remote("dev", raw, is_directory).expect("valid remote path")
    }

    #[test]
    fn lanes_split_transfers_from_admin_work() {
        assert_eq!(OperationKind::Push.lane(), Lane::Transfer);
        assert_eq!(OperationKind::Pull.lane(), Lane::Transfer);
        for kind in [
            OperationKind::Move,
            OperationKind::Delete,
            OperationKind::MakeDir,
            OperationKind::Rename,
            OperationKind::Write,
        ] {
            assert_eq!(kind.lane(), Lane::Administrative);
        }
    }

    #[test]
    fn terminal_statuses_never_transition() {
        for terminal in [
            OperationStatus::Completed,
            OperationStatus::Failed,
            OperationStatus::Canceled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                OperationStatus::Waiting,
                OperationStatus::Running,
                OperationStatus::Completed,
                OperationStatus::Failed,
                OperationStatus::Canceled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(OperationStatus::Waiting.can_transition_to(OperationStatus::Canceled));
        assert!(!OperationStatus::Waiting.can_transition_to(OperationStatus::Completed));
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let folder = remote("/sd/folder", true);
        let inside = remote("/sd/folder/sub/folder", true);
        let request = OperationRequest::move_to(folder.clone(), inside);
        assert!(matches!(
            request.validate(),
            Err(CoreError::InvalidPath {
                reason: "cannot move an item into itself",
                ..
            })
        ));

        let onto_self = OperationRequest::move_to(folder.clone(), folder);
        assert!(onto_self.validate().is_err());

        let sibling = OperationRequest::move_to(
            remote("/sd/folder", true),
            remote("/sd/folder2/folder", true),
        );
        assert!(sibling.validate().is_ok());
    }

    #[test]
    fn validate_checks_filesystems_and_payloads() -> TestResult<()> {
        let host = FsPath::host("/tmp/a.txt", false)?;
        let remote_file = remote("/sd/a.txt", false);

        assert!(OperationRequest::push(host.clone(), remote_file.clone())
            .validate()
            .is_ok());
        assert!(OperationRequest::pull(host.clone(), remote_file.clone())
            .validate()
            .is_err());
        assert!(OperationRequest::delete(remote("/", true)).validate().is_err());

        let mut write = OperationRequest::write(remote_file, WritePayload::Touch);
        assert!(write.validate().is_ok());
        write.write = None;
        assert!(write.validate().is_err());
        Ok(())
    }

    #[test]
    fn rename_keeps_parent() -> TestResult<()> {
        let request = OperationRequest::rename(remote("/sd/old.txt", false), "new.txt")?;
        let destination = request.destination.as_ref().ok_or("destination")?;
        assert_eq!(destination.full_path(), "/sd/new.txt");
        assert!(OperationRequest::rename(remote("/sd/old.txt", false), "a/b").is_err());
        Ok(())
    }

    #[test]
    fn batch_expands_one_request_per_item() -> TestResult<()> {
        let batch = BatchRequest {
            kind: OperationKind::Move,
            sources: vec![
                remote("/sd/a.txt", false).into(),
                remote("/sd/b", true).into(),
            ],
            destination_dir: Some(remote("/sd/archive", true)),
            device_id: Some("dev".into()),
        };
        let requests = batch.expand()?;
        assert_eq!(requests.len(), 2);
        let targets: Vec<_> = requests
            .iter()
            .filter_map(|r| r.destination.as_ref().map(FsPath::full_path))
            .collect();
        assert_eq!(targets, ["/sd/archive/a.txt", "/sd/archive/b"]);
        assert!(requests.iter().all(|r| r.device_id.as_deref() == Some("dev")));

        let rename = BatchRequest {
            kind: OperationKind::Rename,
            sources: vec![remote("/sd/a.txt", false).into()],
            destination_dir: None,
            device_id: None,
        };
        assert!(matches!(
            rename.expand(),
            Err(CoreError::UnsupportedBatch { .. })
        ));
        Ok(())
    }
}
