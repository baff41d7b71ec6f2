#![forbid(unsafe_code)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "test utility crate, numeric casts are acceptable"
)]

//! Shared test utilities for the readahead workspace.

pub mod memory_source;
pub mod rng;
pub mod stalling;

pub use memory_source::{MemorySource, SourceStats, test_bytes};
pub use rng::Xorshift64;
pub use stalling::{StallGate, StallingSource};

/// Install a test-writer subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
