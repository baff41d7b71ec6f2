#![forbid(unsafe_code)]

//! Memory ring buffer strategy.
//!
//! The ring holds `front + back` bytes. Up to `back` bytes behind the read
//! cursor are protected so that short backward seeks are served from memory;
//! everything else is read-ahead capacity. Writes never evict protected bytes:
//! when the ring is full the writer sees a zero `max_write_size` and has to
//! wait for the reader.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::{CacheStrategy, ReadOutcome, SeekOutcome, StorageError, StorageResult, WaitOutcome};

/// Snapshot of a ring's logical cursors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheBounds {
    /// First cached byte.
    pub beg: u64,
    /// Read cursor.
    pub cur: u64,
    /// One past the last cached byte.
    pub end: u64,
}

struct RingState {
    buf: Vec<u8>,
    beg: u64,
    end: u64,
    cur: u64,
    end_of_input: bool,
}

impl RingState {
    fn empty() -> Self {
        Self {
            buf: Vec::new(),
            beg: 0,
            end: 0,
            cur: 0,
            end_of_input: false,
        }
    }

    fn is_cached(&self, pos: u64) -> bool {
        pos >= self.beg && pos <= self.end
    }
}

/// Fixed-size memory ring implementing [`CacheStrategy`].
pub struct CircularCache {
    size: usize,
    size_back: usize,
    state: Mutex<RingState>,
    written: Condvar,
    space: Condvar,
}

impl std::fmt::Debug for CircularCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircularCache")
            .field("size", &self.size)
            .field("size_back", &self.size_back)
            .field("beg", &state.beg)
            .field("cur", &state.cur)
            .field("end", &state.end)
            .finish_non_exhaustive()
    }
}

impl CircularCache {
    /// Create an unopened ring with `front` read-ahead bytes and `back`
    /// protected history bytes.
    #[must_use]
    pub fn new(front: usize, back: usize) -> Self {
        Self {
            size: front + back,
            size_back: back,
            state: Mutex::new(RingState::empty()),
            written: Condvar::new(),
            space: Condvar::new(),
        }
    }

    /// Total ring capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Read-ahead capacity in bytes.
    #[must_use]
    pub fn front_capacity(&self) -> usize {
        self.size - self.size_back
    }

    #[must_use]
    pub fn bounds(&self) -> CacheBounds {
        let state = self.state.lock();
        CacheBounds {
            beg: state.beg,
            cur: state.cur,
            end: state.end,
        }
    }

    /// Space left for writing given the protected back window.
    fn write_limit(&self, state: &RingState) -> u64 {
        let back = state.cur - state.beg;
        let front = state.end - state.cur;
        (self.size as u64)
            .saturating_sub(back.min(self.size_back as u64))
            .saturating_sub(front)
    }
}

impl CacheStrategy for CircularCache {
    fn open(&self) -> StorageResult<()> {
        if self.size == 0 {
            return Err(StorageError::Failed("ring size is zero".to_string()));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(self.size)
            .map_err(|_| StorageError::Allocation { size: self.size })?;
        buf.resize(self.size, 0);

        let mut state = self.state.lock();
        *state = RingState::empty();
        state.buf = buf;
        Ok(())
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            state.buf = Vec::new();
        }
        self.written.notify_all();
        self.space.notify_all();
    }

    fn max_write_size(&self, requested: usize) -> usize {
        let state = self.state.lock();
        let limit = self.write_limit(&state);
        #[allow(clippy::cast_possible_truncation)] // limit <= ring size
        requested.min(limit as usize)
    }

    fn write(&self, data: &[u8]) -> StorageResult<usize> {
        let mut state = self.state.lock();
        if state.buf.is_empty() {
            return Err(StorageError::NotOpen);
        }

        #[allow(clippy::cast_possible_truncation)] // offsets inside the ring
        let (pos, limit) = (
            (state.end % self.size as u64) as usize,
            self.write_limit(&state) as usize,
        );
        let wrap = self.size - pos;
        let len = data.len().min(limit).min(wrap);
        if len == 0 {
            return Ok(0);
        }

        state.buf[pos..pos + len].copy_from_slice(&data[..len]);
        state.end += len as u64;

        // Drop history that was overwritten.
        if state.end - state.beg > self.size as u64 {
            state.beg = state.end - self.size as u64;
        }
        drop(state);

        self.written.notify_all();
        Ok(len)
    }

    fn read(&self, buf: &mut [u8]) -> StorageResult<ReadOutcome> {
        let mut state = self.state.lock();
        if state.buf.is_empty() {
            return Err(StorageError::NotOpen);
        }

        #[allow(clippy::cast_possible_truncation)]
        let pos = (state.cur % self.size as u64) as usize;
        let front = state.end - state.cur;
        #[allow(clippy::cast_possible_truncation)]
        let avail = ((self.size - pos) as u64).min(front) as usize;

        if avail == 0 {
            return Ok(if state.end_of_input {
                ReadOutcome::Eof
            } else {
                ReadOutcome::WouldBlock
            });
        }

        let len = buf.len().min(avail);
        buf[..len].copy_from_slice(&state.buf[pos..pos + len]);
        state.cur += len as u64;
        drop(state);

        self.space.notify_all();
        Ok(ReadOutcome::Data(len))
    }

    fn wait_for_data(&self, minimum: u64, timeout: Duration) -> WaitOutcome {
        let minimum = minimum.min(self.front_capacity() as u64);
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            let avail = state.end - state.cur;
            if avail >= minimum {
                return WaitOutcome::Ready(avail);
            }
            if state.end_of_input || state.buf.is_empty() {
                return WaitOutcome::EndOfInput(avail);
            }
            if self.written.wait_until(&mut state, deadline).timed_out() {
                let avail = state.end - state.cur;
                return if avail >= minimum {
                    WaitOutcome::Ready(avail)
                } else {
                    WaitOutcome::TimedOut(avail)
                };
            }
        }
    }

    fn available(&self) -> u64 {
        let state = self.state.lock();
        state.end - state.cur
    }

    fn seek(&self, pos: u64) -> SeekOutcome {
        let mut state = self.state.lock();
        if !state.is_cached(pos) {
            return SeekOutcome::OutOfRange {
                nearest: pos.clamp(state.beg, state.end),
            };
        }
        state.cur = pos;
        drop(state);

        self.space.notify_all();
        SeekOutcome::Moved(pos)
    }

    fn reset(&self, pos: u64, clear_anyway: bool) -> bool {
        let full = {
            let mut state = self.state.lock();
            if !clear_anyway && state.is_cached(pos) {
                state.cur = pos;
                false
            } else {
                state.beg = pos;
                state.end = pos;
                state.cur = pos;
                state.end_of_input = false;
                true
            }
        };
        self.space.notify_all();
        full
    }

    fn cached_end_if_seek_to(&self, pos: u64) -> u64 {
        let state = self.state.lock();
        if state.is_cached(pos) { state.end } else { pos }
    }

    fn cached_end(&self) -> u64 {
        self.state.lock().end
    }

    fn is_cached_position(&self, pos: u64) -> bool {
        self.state.lock().is_cached(pos)
    }

    fn end_of_input(&self) {
        self.state.lock().end_of_input = true;
        self.written.notify_all();
    }

    fn clear_end_of_input(&self) {
        self.state.lock().end_of_input = false;
    }

    fn is_end_of_input(&self) -> bool {
        self.state.lock().end_of_input
    }

    fn wait_for_space(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        !self.space.wait_for(&mut state, timeout).timed_out()
    }

    fn create_new(&self) -> Box<dyn CacheStrategy> {
        Box::new(Self::new(self.front_capacity(), self.size_back))
    }
}
