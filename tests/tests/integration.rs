//! All integration tests for readahead
#![allow(
    clippy::unwrap_used,
    reason = "integration test crate, unwraps are acceptable in test code"
)]
