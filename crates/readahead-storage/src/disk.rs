#![forbid(unsafe_code)]

//! Temporary-file strategy.
//!
//! Caches one contiguous region `[start, start + written)` in an anonymous
//! temporary file that grows without bound. A full reset truncates the file
//! and starts the region over at the new position.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::{CacheStrategy, ReadOutcome, SeekOutcome, StorageError, StorageResult, WaitOutcome};

#[derive(Default)]
struct DiskState {
    file: Option<File>,
    /// Stream offset of the first byte in the file.
    start: u64,
    /// Bytes written to the file.
    write_pos: u64,
    /// Read cursor, relative to `start`.
    read_pos: u64,
    end_of_input: bool,
}

impl DiskState {
    fn is_cached(&self, pos: u64) -> bool {
        pos >= self.start && pos <= self.start + self.write_pos
    }
}

/// Unbounded temporary file implementing [`CacheStrategy`].
pub struct SimpleFileCache {
    dir: Option<PathBuf>,
    state: Mutex<DiskState>,
    data_avail: Condvar,
    space: Condvar,
}

impl std::fmt::Debug for SimpleFileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimpleFileCache")
            .field("dir", &self.dir)
            .field("open", &state.file.is_some())
            .field("start", &state.start)
            .field("write_pos", &state.write_pos)
            .field("read_pos", &state.read_pos)
            .finish_non_exhaustive()
    }
}

impl Default for SimpleFileCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SimpleFileCache {
    /// Create an unopened cache. The backing file is created in `dir`, or in
    /// the system temporary directory when `None`.
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            state: Mutex::new(DiskState::default()),
            data_avail: Condvar::new(),
            space: Condvar::new(),
        }
    }
}

impl CacheStrategy for SimpleFileCache {
    fn open(&self) -> StorageResult<()> {
        let file = match &self.dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        debug!(dir = ?self.dir, "temporary cache file created");

        let mut state = self.state.lock();
        *state = DiskState {
            file: Some(file),
            ..DiskState::default()
        };
        Ok(())
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            state.file = None;
        }
        self.data_avail.notify_all();
        self.space.notify_all();
    }

    fn max_write_size(&self, requested: usize) -> usize {
        requested
    }

    fn write(&self, data: &[u8]) -> StorageResult<usize> {
        let mut state = self.state.lock();
        let offset = state.write_pos;
        let file = state.file.as_mut().ok_or(StorageError::NotOpen)?;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        state.write_pos += data.len() as u64;
        drop(state);

        self.data_avail.notify_all();
        Ok(data.len())
    }

    fn read(&self, buf: &mut [u8]) -> StorageResult<ReadOutcome> {
        let mut state = self.state.lock();
        let offset = state.read_pos;
        let ahead = state.write_pos - state.read_pos;
        let end_of_input = state.end_of_input;
        let file = state.file.as_mut().ok_or(StorageError::NotOpen)?;

        if ahead == 0 {
            return Ok(if end_of_input {
                ReadOutcome::Eof
            } else {
                ReadOutcome::WouldBlock
            });
        }

        #[allow(clippy::cast_possible_truncation)] // bounded by buf.len()
        let len = (buf.len() as u64).min(ahead) as usize;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..len])?;
        state.read_pos += len as u64;
        drop(state);

        self.space.notify_all();
        Ok(ReadOutcome::Data(len))
    }

    fn wait_for_data(&self, minimum: u64, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            let avail = state.write_pos - state.read_pos;
            if avail >= minimum {
                return WaitOutcome::Ready(avail);
            }
            if state.end_of_input || state.file.is_none() {
                return WaitOutcome::EndOfInput(avail);
            }
            if self.data_avail.wait_until(&mut state, deadline).timed_out() {
                let avail = state.write_pos - state.read_pos;
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
        state.write_pos - state.read_pos
    }

    fn seek(&self, pos: u64) -> SeekOutcome {
        let mut state = self.state.lock();
        if !state.is_cached(pos) {
            let end = state.start + state.write_pos;
            return SeekOutcome::OutOfRange {
                nearest: pos.clamp(state.start, end),
            };
        }
        state.read_pos = pos - state.start;
        SeekOutcome::Moved(pos)
    }

    fn reset(&self, pos: u64, clear_anyway: bool) -> bool {
        let full = {
            let mut state = self.state.lock();
            if !clear_anyway && state.is_cached(pos) {
                state.read_pos = pos - state.start;
                false
            } else {
                state.start = pos;
                state.write_pos = 0;
                state.read_pos = 0;
                state.end_of_input = false;
                if let Some(file) = state.file.as_mut()
                    && let Err(e) = file.set_len(0)
                {
                    warn!(error = %e, "failed to truncate temporary cache file");
                }
                true
            }
        };
        self.space.notify_all();
        full
    }

    fn cached_end_if_seek_to(&self, pos: u64) -> u64 {
        let state = self.state.lock();
        if state.is_cached(pos) {
            state.start + state.write_pos
        } else {
            pos
        }
    }

    fn cached_end(&self) -> u64 {
        let state = self.state.lock();
        state.start + state.write_pos
    }

    fn is_cached_position(&self, pos: u64) -> bool {
        self.state.lock().is_cached(pos)
    }

    fn end_of_input(&self) {
        self.state.lock().end_of_input = true;
        self.data_avail.notify_all();
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
        Box::new(Self::new(self.dir.clone()))
    }
}
