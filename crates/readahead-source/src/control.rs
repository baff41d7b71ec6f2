#![forbid(unsafe_code)]

/// Out-of-band requests understood by sources and caches.
///
/// Sources typically accept `SetCache`, `SetRetry` and `SeekPossible`;
/// a cache additionally answers `CacheStatus` and `CacheSetRate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoControl {
    /// A cache has been installed on top of this source.
    SetCache,
    /// Enable or disable the source's own retry logic.
    SetRetry(bool),
    /// Ask whether the stream supports seeking.
    SeekPossible,
    /// Ask a cache for its fill status.
    CacheStatus,
    /// Set a cache's fill-rate cap in bytes per second (0 = unlimited).
    CacheSetRate(u32),
}

/// Reply to an [`IoControl`] request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoReply {
    /// Request applied; nothing to report.
    Done,
    SeekPossible(bool),
    CacheStatus(CacheStatus),
}

/// Snapshot of a cache's fill state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStatus {
    /// Bytes cached ahead of the read position.
    pub forward: u64,
    /// Configured fill-rate cap in bytes per second (0 = unlimited).
    pub max_rate: u32,
    /// Measured average fill rate in bytes per second.
    pub current_rate: u32,
    /// The source could not keep up while the cache was filling.
    ///
    /// Cleared by the query that reports it.
    pub low_speed: bool,
}
