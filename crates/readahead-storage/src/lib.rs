#![forbid(unsafe_code)]

//! `readahead-storage`
//!
//! Cache strategies for the read-ahead file cache.
//!
//! Every strategy implements [`CacheStrategy`]: a bounded store with a write
//! cursor (advanced by the fill thread) and a read cursor (advanced by the
//! consumer) over one logical byte stream. Strategies synchronize internally,
//! so one writer and one reader may use the same instance concurrently.
//!
//! - [`CircularCache`]: fixed-size memory ring with a protected back buffer
//! - [`SimpleFileCache`]: unbounded temporary file on disk
//! - [`DoubleCache`]: two strategies kept for two distant stream regions

mod circular;
mod disk;
mod double;
mod error;
mod strategy;

pub use circular::{CacheBounds, CircularCache};
pub use disk::SimpleFileCache;
pub use double::DoubleCache;
pub use error::{StorageError, StorageResult};
pub use strategy::{CacheStrategy, ReadOutcome, SeekOutcome, WaitOutcome};
