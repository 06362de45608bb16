#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Engine-agnostic path model, operation DTOs, and collaborator interfaces.
//!
//! Layout: `model/` (paths, entries, operations, recycle index codec),
//! `service/` (traits implemented by collaborators), `progress.rs`
//! (progress reporting handle), `error.rs` (shared error taxonomy).

pub mod error;
pub mod model;
pub mod progress;
pub mod service;

pub use error::{CoreError, CoreResult};
pub use model::{
    BatchRequest, EntryType, FileEntry, FsPath, Lane, OperationId, OperationKind,
    OperationRequest, OperationSnapshot, OperationSource, OperationState, OperationStatus,
    PathKind, RECYCLE_NAME_MAX, RECYCLE_SEPARATOR, RecycleIndexEntry, Relation, WritePayload,
};
pub use progress::ProgressSink;
pub use service::{
    DeviceRegistry, DirectoryListing, TransferDirection, TransferEngine, TransferOutcome,
    TransferRequest,
};
