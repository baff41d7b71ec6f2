//! Source whose reads block until the test lets them through.

use std::{io::SeekFrom, sync::Arc};

use parking_lot::{Condvar, Mutex};
use readahead_source::{IoControl, IoReply, OpenFlags, Source, SourceResult};

use crate::MemorySource;

/// Shared switch that releases a [`StallingSource`].
#[derive(Clone, Debug, Default)]
pub struct StallGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StallGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let all current and future blocked reads proceed.
    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.inner.0.lock()
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock();
        while !*open {
            cvar.wait(&mut open);
        }
    }
}

/// Wraps a [`MemorySource`]; every read at or past `stall_at` blocks until
/// the gate opens.
///
/// A cache joining its fill thread waits for a blocked read to return, so
/// tests must open the gate before dropping the cache.
pub struct StallingSource {
    inner: MemorySource,
    stall_at: u64,
    pos: u64,
    gate: StallGate,
}

impl StallingSource {
    #[must_use]
    pub fn new(inner: MemorySource, stall_at: u64, gate: StallGate) -> Self {
        Self {
            inner,
            stall_at,
            pos: 0,
            gate,
        }
    }
}

impl Source for StallingSource {
    fn open(&mut self, location: &str, flags: OpenFlags) -> SourceResult<()> {
        self.pos = 0;
        self.inner.open(location, flags)
    }

    fn read(&mut self, buf: &mut [u8]) -> SourceResult<usize> {
        if self.pos >= self.stall_at {
            self.gate.wait();
        }
        let limit = if self.pos < self.stall_at {
            buf.len().min((self.stall_at - self.pos) as usize)
        } else {
            buf.len()
        };
        let n = self.inner.read(&mut buf[..limit])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> SourceResult<u64> {
        self.pos = self.inner.seek(pos)?;
        Ok(self.pos)
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn chunk_size(&self) -> usize {
        self.inner.chunk_size()
    }

    fn io_control(&mut self, request: IoControl) -> SourceResult<IoReply> {
        self.inner.io_control(request)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
