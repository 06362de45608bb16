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

//! Operation queue, progress tracking, recycle bin, and the engine that wires
//! them to a device.

pub mod engine;
pub mod error;
pub mod progress;
pub mod queue;
pub mod recycle;

pub use engine::{Engine, EngineCollaborators, SelectedDevice};
pub use error::{QueueError, QueueResult, RecycleError, RecycleResult};
pub use progress::{ProgressStrategy, ProgressTracker};
pub use queue::{OperationHandle, OperationQueue, QueueParts};
pub use recycle::{RecycleCoordinator, RecycleSettings};
