//! Core domain types shared across the workspace.

mod entry;
mod operation;
mod path;
mod recycle;

pub use entry::{EntryType, FileEntry};
pub use operation::{
    BatchRequest, Lane, OperationId, OperationKind, OperationRequest, OperationSnapshot,
    OperationSource, OperationState, OperationStatus, WritePayload,
};
pub use path::{FsPath, HOST_SEPARATOR, PathKind, REMOTE_SEPARATOR, Relation};
pub use recycle::{RECYCLE_NAME_MAX, RECYCLE_SEPARATOR, RECYCLE_TIME_FORMAT, RecycleIndexEntry};
