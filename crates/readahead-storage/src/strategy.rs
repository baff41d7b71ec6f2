#![forbid(unsafe_code)]

use std::{fmt::Debug, time::Duration};

use crate::StorageResult;

/// Result of reading from a cache strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were copied and the read cursor advanced by `n`.
    Data(usize),
    /// Nothing is cached ahead of the cursor yet, but more input is expected.
    WouldBlock,
    /// Input has ended and everything before it has been read.
    Eof,
}

/// Result of waiting for cached data.
///
/// Every variant carries the number of bytes available ahead of the read
/// cursor at the moment the wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least the requested amount is available.
    Ready(u64),
    /// Input has ended; the amount may be short of the request.
    EndOfInput(u64),
    /// The timeout elapsed first.
    TimedOut(u64),
}

impl WaitOutcome {
    #[must_use]
    pub fn available(self) -> u64 {
        match self {
            Self::Ready(n) | Self::EndOfInput(n) | Self::TimedOut(n) => n,
        }
    }
}

/// Result of an in-place seek of the read cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The cursor now sits at the given position.
    Moved(u64),
    /// The target is not cached. The cursor did not move; `nearest` is the
    /// closest cached position.
    OutOfRange { nearest: u64 },
}

/// Bounded store over a logical byte stream.
///
/// Coordinates are absolute offsets in the source stream. A strategy tracks
/// `beg..=end` (cached bytes) and a read cursor `cur` with
/// `beg <= cur <= end` while open.
///
/// Threading contract:
/// - `write`, `max_write_size`, `end_of_input` are called by the fill thread.
/// - `read`, `wait_for_data`, `seek` are called by the consumer.
/// - `open`, `close`, `reset` are called while the owner guarantees the
///   other side is not mid-operation on the same logical region.
///
/// All methods take `&self`; implementations carry their own lock and
/// condition variables.
pub trait CacheStrategy: Debug + Send + Sync {
    /// Allocate backing storage.
    ///
    /// # Errors
    ///
    /// Returns error if memory or the backing file cannot be obtained.
    fn open(&self) -> StorageResult<()>;

    /// Release backing storage and wake all waiters. Idempotent.
    fn close(&self);

    /// Bytes that can be written right now without evicting data the
    /// strategy must retain, capped at `requested`.
    fn max_write_size(&self, requested: usize) -> usize;

    /// Append bytes at the write position.
    ///
    /// Returns the number of bytes stored, which may be less than
    /// `data.len()` (or zero) when space is short.
    ///
    /// # Errors
    ///
    /// Returns error on unrecoverable failure (closed store, disk I/O).
    fn write(&self, data: &[u8]) -> StorageResult<usize>;

    /// Copy bytes from the read cursor into `buf`.
    ///
    /// # Errors
    ///
    /// Returns error if the store is closed or its backing I/O fails.
    fn read(&self, buf: &mut [u8]) -> StorageResult<ReadOutcome>;

    /// Block until `minimum` bytes are available ahead of the cursor, input
    /// ends, or `timeout` elapses.
    fn wait_for_data(&self, minimum: u64, timeout: Duration) -> WaitOutcome;

    /// Bytes available ahead of the cursor, without waiting.
    fn available(&self) -> u64;

    /// Move the read cursor without I/O if `pos` is cached.
    fn seek(&self, pos: u64) -> SeekOutcome;

    /// Start logical coverage at `pos`.
    ///
    /// Returns `true` for a full reset (everything discarded and
    /// `beg = cur = end = pos`), `false` when `pos` was cached, `clear_anyway`
    /// was not set, and only the cursor moved.
    fn reset(&self, pos: u64, clear_anyway: bool) -> bool;

    /// End of the data that would be contiguously cached after a seek to `pos`.
    fn cached_end_if_seek_to(&self, pos: u64) -> u64;

    fn cached_end(&self) -> u64;

    fn is_cached_position(&self, pos: u64) -> bool;

    /// Mark that no more data will be written.
    fn end_of_input(&self);

    fn clear_end_of_input(&self);

    fn is_end_of_input(&self) -> bool;

    /// Wait until a read or reset frees space, or `timeout` elapses.
    ///
    /// Returns `true` if woken by a space notification.
    fn wait_for_space(&self, timeout: Duration) -> bool;

    /// Build an unopened strategy of the same kind and geometry.
    fn create_new(&self) -> Box<dyn CacheStrategy>;
}
