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

//! File- and environment-backed engine configuration.
//!
//! Layout: `model.rs` (typed configuration), `defaults.rs` (default values),
//! `loader.rs` (TOML file + `ADBX_*` overrides), `validate.rs` (field checks),
//! `error.rs` (error taxonomy).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, load, load_from};
pub use model::{EngineConfig, ProgressMethod};
