#![forbid(unsafe_code)]

use std::io::SeekFrom;

use crate::{IoControl, IoReply, OpenFlags, SourceResult};

/// Blocking byte source consumed by the cache's fill thread.
///
/// Normative:
/// - `read` returns `Ok(0)` when no data is available right now. This covers
///   both a true end of stream and a transient stall; the caller decides which
///   one it is by comparing its position with `len()`.
/// - `len` returns `0` when the length is unknown. It may grow between calls
///   for live or still-downloading sources.
/// - `chunk_size` returns the natural read granularity, or `0` if the source
///   has none.
/// - `io_control` answers the requests it understands and returns
///   [`SourceError::Unsupported`](crate::SourceError::Unsupported) otherwise.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait Source: Send + 'static {
    /// Open the location with the given flags.
    ///
    /// # Errors
    ///
    /// Returns error if the location cannot be resolved or opened.
    fn open(&mut self, location: &str, flags: OpenFlags) -> SourceResult<()>;

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    fn read(&mut self, buf: &mut [u8]) -> SourceResult<usize>;

    /// Move the read position, returning the new absolute position.
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot seek or the target is invalid.
    fn seek(&mut self, pos: SeekFrom) -> SourceResult<u64>;

    fn len(&self) -> u64;

    fn chunk_size(&self) -> usize;

    /// Handle an out-of-band request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unsupported`](crate::SourceError::Unsupported)
    /// for requests the source does not understand.
    fn io_control(&mut self, request: IoControl) -> SourceResult<IoReply>;

    fn close(&mut self);
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn open(&mut self, location: &str, flags: OpenFlags) -> SourceResult<()> {
        (**self).open(location, flags)
    }

    fn read(&mut self, buf: &mut [u8]) -> SourceResult<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> SourceResult<u64> {
        (**self).seek(pos)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn chunk_size(&self) -> usize {
        (**self).chunk_size()
    }

    fn io_control(&mut self, request: IoControl) -> SourceResult<IoReply> {
        (**self).io_control(request)
    }

    fn close(&mut self) {
        (**self).close();
    }
}
