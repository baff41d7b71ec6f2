#![forbid(unsafe_code)]

//! # Readahead
//!
//! Facade crate for the read-ahead file cache.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::io::Read;
//!
//! use readahead::prelude::*;
//!
//! let mut cache = readahead::open_local("/music/track.flac", CacheSettings::default())?;
//! let mut head = [0u8; 4];
//! cache.read_exact(&mut head)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod source {
    pub use readahead_source::*;
}

pub mod storage {
    pub use readahead_storage::*;
}

pub mod cache {
    pub use readahead_cache::*;
}

use readahead_cache::{CacheResult, CacheSettings, FileCache};
use readahead_source::LocalFileSource;

/// Open a local file (path or `file://` URL) behind a read-ahead cache.
///
/// # Errors
///
/// Returns error if the file or the cache cannot be opened.
pub fn open_local(location: &str, settings: CacheSettings) -> CacheResult<FileCache<LocalFileSource>> {
    let mut cache = FileCache::new(LocalFileSource::new(), settings);
    cache.open(location)?;
    Ok(cache)
}

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use readahead_cache::{
        CacheError, CacheEvent, CacheHandle, CacheResult, CacheSettings, EventBus, FileCache,
    };
    pub use readahead_source::{
        CacheStatus, IoControl, IoReply, LocalFileSource, OpenFlags, Source, SourceError,
    };
    pub use readahead_storage::CacheStrategy;
}
