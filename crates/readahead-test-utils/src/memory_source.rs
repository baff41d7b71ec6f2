//! In-memory [`Source`] implementation for testing.

use std::{
    io::SeekFrom,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use readahead_source::{IoControl, IoReply, OpenFlags, Source, SourceError, SourceResult};

/// Deterministic test payload: byte `i` is `i % 251`.
///
/// The prime modulus keeps the pattern from lining up with power-of-two
/// chunk and ring sizes.
#[must_use]
pub fn test_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Counters shared between a [`MemorySource`] and the test that built it.
///
/// The source usually moves into the cache's fill thread, so the test keeps a
/// clone of this handle to observe what happened.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    seeks: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    controls: Arc<Mutex<Vec<IoControl>>>,
    flags: Arc<Mutex<Option<OpenFlags>>>,
}

impl SourceStats {
    /// Successful source seeks.
    #[must_use]
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    /// Read calls, including ones that returned no data.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Every control request received, in order.
    #[must_use]
    pub fn controls(&self) -> Vec<IoControl> {
        self.controls.lock().clone()
    }

    /// Flags of the last successful open.
    #[must_use]
    pub fn open_flags(&self) -> Option<OpenFlags> {
        *self.flags.lock()
    }
}

/// In-memory source with switchable capabilities.
pub struct MemorySource {
    data: Arc<Vec<u8>>,
    pos: u64,
    open: bool,
    seekable: bool,
    known_len: bool,
    fail_open: bool,
    chunk_size: usize,
    read_limit: usize,
    read_delay: Option<Duration>,
    empty_reads: usize,
    empty_reads_at: u64,
    stats: SourceStats,
}

impl MemorySource {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            pos: 0,
            open: false,
            seekable: true,
            known_len: true,
            fail_open: false,
            chunk_size: 0,
            read_limit: usize::MAX,
            read_delay: None,
            empty_reads: 0,
            empty_reads_at: 0,
            stats: SourceStats::default(),
        }
    }

    /// Report `chunk_size` as the natural read granularity.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Return at most `limit` bytes per read.
    #[must_use]
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit.max(1);
        self
    }

    /// Sleep before every read, bounding the source's throughput.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Return `Ok(0)` for the first `count` reads, as a stalled network
    /// source would.
    #[must_use]
    pub fn with_empty_reads(self, count: usize) -> Self {
        self.with_empty_reads_at(0, count)
    }

    /// Return `Ok(0)` for `count` reads once the position reaches `offset`.
    #[must_use]
    pub fn with_empty_reads_at(mut self, offset: u64, count: usize) -> Self {
        self.empty_reads = count;
        self.empty_reads_at = offset;
        self
    }

    /// Refuse seeks and report `SeekPossible(false)`.
    #[must_use]
    pub fn non_seekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    /// Report length 0 (unknown).
    #[must_use]
    pub fn unknown_length(mut self) -> Self {
        self.known_len = false;
        self
    }

    /// Fail every `open` call.
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    #[must_use]
    pub fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Source for MemorySource {
    fn open(&mut self, _location: &str, flags: OpenFlags) -> SourceResult<()> {
        if self.fail_open {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "memory source configured to fail",
            )));
        }
        self.open = true;
        self.pos = 0;
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        *self.stats.flags.lock() = Some(flags);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> SourceResult<usize> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        self.stats.reads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if self.empty_reads > 0 && self.pos >= self.empty_reads_at {
            self.empty_reads -= 1;
            return Ok(0);
        }
        if self.pos >= self.size() {
            return Ok(0);
        }

        let offset = self.pos as usize;
        let n = buf
            .len()
            .min(self.read_limit)
            .min(self.data.len() - offset);
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> SourceResult<u64> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        if !self.seekable {
            return Err(SourceError::Unsupported);
        }

        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) if self.known_len => self.size().checked_add_signed(delta),
            SeekFrom::End(_) => return Err(SourceError::Unsupported),
        };
        let target = target.ok_or_else(|| {
            SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start",
            ))
        })?;

        self.pos = target;
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);
        Ok(target)
    }

    fn len(&self) -> u64 {
        if self.known_len { self.size() } else { 0 }
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn io_control(&mut self, request: IoControl) -> SourceResult<IoReply> {
        self.stats.controls.lock().push(request);
        match request {
            IoControl::SeekPossible => Ok(IoReply::SeekPossible(self.seekable)),
            IoControl::SetCache | IoControl::SetRetry(_) => Ok(IoReply::Done),
            IoControl::CacheStatus | IoControl::CacheSetRate(_) => Err(SourceError::Unsupported),
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
