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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (env/helpers), device.rs (in-memory device runner),
//! transfer.rs (fake transfer engine), collaborators.rs (listing/registry fakes).

pub mod collaborators;
pub mod device;
pub mod fixtures;
pub mod transfer;

pub use collaborators::{FixedDeviceRegistry, InMemoryListing};
pub use device::FakeDevice;
pub use fixtures::{adb_available, wait_until};
pub use transfer::FakeTransferEngine;
