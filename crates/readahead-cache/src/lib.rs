#![forbid(unsafe_code)]

//! `readahead-cache`
//!
//! A read-ahead cache between a slow blocking [`Source`](readahead_source::Source)
//! and a consumer that reads and seeks synchronously.
//!
//! [`FileCache`] owns a background fill thread that pulls chunks from the
//! source into a [`CacheStrategy`](readahead_storage::CacheStrategy) while
//! the consumer reads from it. Seeks inside the cached window are served in
//! place; other seeks go through a request/acknowledge handshake with the
//! fill thread.

mod error;
mod events;
mod file_cache;
mod filler;
mod handle;
mod rate;
mod settings;
mod shared;

pub use error::{CacheError, CacheResult};
pub use events::{CacheEvent, EventBus};
pub use file_cache::FileCache;
pub use handle::CacheHandle;
pub use rate::WriteRate;
pub use settings::CacheSettings;
