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

//! Logging setup and span helpers shared across the workspace.
//!
//! Layout: `init.rs` (subscriber installation and format selection),
//! `context.rs` (process and operation spans).

pub mod context;
pub mod init;

pub use context::{GlobalContextGuard, operation_span};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
