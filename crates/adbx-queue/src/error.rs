//! # Design
//!
//! - Submission errors (`QueueError`) are returned to the caller; failures of
//!   accepted operations are recorded on the operation itself.
//! - Recycle errors wrap the lower layers instead of flattening their text.

use adbx_core::CoreError;
use adbx_fsops::FsOpsError;
use thiserror::Error;

/// Result type for queue submissions.
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for recycle coordination.
pub type RecycleResult<T> = Result<T, RecycleError>;

/// Errors returned when a request cannot be accepted.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The request's paths are malformed or would corrupt the tree.
    #[error("invalid operation request")]
    InvalidPath {
        /// Validation failure.
        #[from]
        source: CoreError,
    },
    /// No device was given and none is currently selected.
    #[error("no device selected")]
    NoDevice,
    /// The queue has been shut down.
    #[error("operation queue is closed")]
    Closed,
}

/// Errors produced by trash and restore.
#[derive(Debug, Error)]
pub enum RecycleError {
    /// A trashed filename does not decode into recycle metadata.
    #[error("corrupt trash entry")]
    CorruptTrashEntry {
        /// Offending filename.
        name: String,
        /// Decoding failure.
        source: CoreError,
    },
    /// Restoring would overwrite an item that already exists.
    #[error("restore target already exists")]
    RestoreConflict {
        /// Path that is already taken.
        path: String,
    },
    /// An item or location is not eligible for the recycle bin.
    #[error("invalid recycle path")]
    InvalidPath {
        /// Validation failure.
        source: CoreError,
    },
    /// Submitting the resulting move failed.
    #[error("recycle submission rejected")]
    Queue {
        /// Queue failure.
        #[from]
        source: QueueError,
    },
    /// A direct remote call (mkdir, listing, delete) failed.
    #[error("recycle remote call failed")]
    Remote {
        /// Remote failure.
        #[from]
        source: FsOpsError,
    },
    /// The listing collaborator could not answer.
    #[error("directory listing unavailable")]
    Listing {
        /// Collaborator failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl RecycleError {
    pub(crate) fn corrupt(name: impl Into<String>, source: CoreError) -> Self {
        Self::CorruptTrashEntry {
            name: name.into(),
            source,
        }
    }

    pub(crate) fn listing(err: anyhow::Error) -> Self {
        Self::Listing { source: err.into() }
    }

    /// Text shown to users: remote tool output when there is any, otherwise
    /// the error's own label.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote { source } => source.user_message(),
            Self::InvalidPath { source } | Self::CorruptTrashEntry { source, .. } => {
                source.label().to_string()
            }
            Self::Queue {
                source: QueueError::InvalidPath { source },
            } => source.label().to_string(),
            other => other.to_string(),
        }
    }
}
