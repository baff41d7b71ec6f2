#![forbid(unsafe_code)]

use std::{
    io::{self, SeekFrom},
    sync::{Arc, atomic::Ordering},
    thread::{self, JoinHandle},
};

use readahead_source::{IoControl, IoReply, OpenFlags, Source, redact};
use readahead_storage::{
    CacheStrategy, CircularCache, DoubleCache, ReadOutcome, SeekOutcome, SimpleFileCache,
    WaitOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    CacheError, CacheEvent, CacheHandle, CacheResult, CacheSettings, EventBus,
    filler::Filler,
    shared::{SeekResponse, Shared, SharedInit},
};

struct Session<S> {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<S>>,
}

/// Read-ahead cache over a [`Source`].
///
/// `open` starts a fill thread named `FileCache` that owns the source until
/// `close`. The consumer API (`read`, `seek`, `position`) is for a single
/// thread; [`CacheHandle`] serves status and rate control to others.
///
/// # Example
///
/// ```no_run
/// use readahead_cache::{CacheSettings, FileCache};
/// use readahead_source::LocalFileSource;
///
/// let mut cache = FileCache::new(LocalFileSource::new(), CacheSettings::default());
/// cache.open("/music/track.flac")?;
/// let mut buf = [0u8; 4096];
/// let n = cache.read(&mut buf)?;
/// # Ok::<(), readahead_cache::CacheError>(())
/// ```
pub struct FileCache<S: Source> {
    settings: CacheSettings,
    flags: OpenFlags,
    cancel: Option<CancellationToken>,
    bus: Option<EventBus>,
    /// The source while no fill thread owns it.
    source: Option<S>,
    session: Option<Session<S>>,
}

impl<S: Source> std::fmt::Debug for FileCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("FileCache");
        s.field("flags", &self.flags).field("open", &self.is_open());
        if let Some(session) = &self.session {
            s.field("source", &session.shared.source_id)
                .field("position", &self.position())
                .field("len", &self.len())
                .field("running", &session.shared.is_running());
        }
        s.finish_non_exhaustive()
    }
}

impl<S: Source> FileCache<S> {
    #[must_use]
    pub fn new(source: S, settings: CacheSettings) -> Self {
        Self {
            settings,
            flags: OpenFlags::empty(),
            cancel: None,
            bus: None,
            source: Some(source),
            session: None,
        }
    }

    /// Describe the content: `AUDIO_VIDEO` disables the file-size cap on the
    /// memory cache, `MULTI_STREAM` keeps two cached regions.
    #[must_use]
    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags.classification();
        self
    }

    /// Stop the fill thread when `cancel` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open `location` and start filling.
    ///
    /// Any previous session is closed first.
    ///
    /// # Errors
    ///
    /// - the source or the strategy fails to open
    /// - the fill thread cannot be spawned
    /// - [`CacheError::NotRunning`] if an earlier fill thread panicked and
    ///   took the source with it
    pub fn open(&mut self, location: &str) -> CacheResult<()> {
        self.close();

        let id = redact(location);
        debug!(source = %id, "opening");

        let mut source = self.source.take().ok_or(CacheError::NotRunning)?;
        let flags = OpenFlags::CACHE_SOURCE | self.flags;
        if let Err(e) = source.open(location, flags) {
            error!(source = %id, error = %e, "failed to open source");
            self.source = Some(source);
            return Err(e.into());
        }

        // Not every source understands these.
        let _ = source.io_control(IoControl::SetCache);
        let _ = source.io_control(IoControl::SetRetry(false));
        let seek_possible = matches!(
            source.io_control(IoControl::SeekPossible),
            Ok(IoReply::SeekPossible(true))
        );

        let source_chunk = source.chunk_size();
        let mut chunk_size = source_chunk.max(self.settings.chunk_size).max(1);
        let file_size = source.len();
        debug!(source = %id, source_chunk, chunk_size, file_size, seek_possible, "source opened");

        let (strategy, forward_capacity) = self.build_strategy(&id, file_size, &mut chunk_size);
        if let Err(e) = strategy.open() {
            error!(source = %id, error = %e, "failed to open cache strategy");
            source.close();
            self.source = Some(source);
            return Err(e.into());
        }

        let cancel = self
            .cancel
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);

        self.start(
            source,
            SharedInit {
                strategy,
                cancel,
                bus: self.bus.clone(),
                source_id: id,
                chunk_size,
                forward_capacity,
                file_size,
                write_rate: self.settings.write_rate,
                seek_possible,
            },
        )
    }

    /// Spawn the fill thread over an opened source and strategy.
    fn start(&mut self, source: S, init: SharedInit) -> CacheResult<()> {
        let shared = Arc::new(Shared::new(init));
        shared.running.store(true, Ordering::Release);

        let filler = Filler::new(source, Arc::clone(&shared), self.settings.clone());
        let thread = thread::Builder::new()
            .name("FileCache".to_string())
            .spawn(move || filler.run())
            .map_err(|e| {
                error!(source = %shared.source_id, error = %e, "failed to spawn fill thread");
                shared.running.store(false, Ordering::Release);
                shared.strategy.close();
                CacheError::Spawn(e)
            })?;

        shared.publish(CacheEvent::Opened {
            chunk_size: shared.chunk_size,
            forward_capacity: shared.forward_capacity,
        });
        self.session = Some(Session {
            shared,
            thread: Some(thread),
        });
        Ok(())
    }

    fn build_strategy(
        &self,
        id: &str,
        file_size: u64,
        chunk_size: &mut usize,
    ) -> (Arc<dyn CacheStrategy>, u64) {
        let multi = self.flags.contains(OpenFlags::MULTI_STREAM);
        let memory = self.settings.memory_size;

        let (inner, forward): (Box<dyn CacheStrategy>, u64) = if memory == 0 {
            debug!(source = %id, dir = ?self.settings.temp_dir, "using disk cache");
            (
                Box::new(SimpleFileCache::new(self.settings.temp_dir.clone())),
                0,
            )
        } else {
            let fits = file_size > 0 && file_size < memory as u64;
            let cache_size = if fits && !self.flags.contains(OpenFlags::AUDIO_VIDEO) {
                // Files that cannot grow need no more room than their size.
                #[allow(clippy::cast_possible_truncation)] // below memory
                let size = file_size as usize;
                *chunk_size = (*chunk_size).min(size);
                size
            } else {
                let size = if multi { memory / 2 } else { memory };
                size.max(chunk_size.saturating_mul(2))
            };

            let back = cache_size / 4;
            let front = cache_size - back;
            debug!(source = %id, cache_size, front, back, multi, "using memory cache");
            (Box::new(CircularCache::new(front, back)), front as u64)
        };

        let strategy: Arc<dyn CacheStrategy> = if multi {
            Arc::new(DoubleCache::new(inner))
        } else {
            Arc::from(inner)
        };
        (strategy, forward)
    }

    /// Stop the fill thread and release the strategy and the source.
    ///
    /// Idempotent; also run on drop.
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let shared = session.shared;
        shared.stop();

        let source = session.thread.take().and_then(|thread| match thread.join() {
            Ok(source) => Some(source),
            Err(_) => {
                error!(source = %shared.source_id, "fill thread panicked");
                None
            }
        });

        shared.strategy.close();
        if let Some(mut source) = source {
            source.close();
            self.source = Some(source);
        }
        debug!(source = %shared.source_id, "closed");
    }

    fn shared(&self) -> CacheResult<&Arc<Shared>> {
        self.session
            .as_ref()
            .map(|s| &s.shared)
            .ok_or(CacheError::NotOpen)
    }

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// Returns `Ok(0)` at end of stream. Never touches the source directly.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Timeout`] if no data arrived within the read timeout
    /// - [`CacheError::NotOpen`] without an open session
    pub fn read(&mut self, buf: &mut [u8]) -> CacheResult<usize> {
        let shared = self.shared()?;
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match shared.strategy.read(buf)? {
                ReadOutcome::Data(n) => {
                    shared.read_pos.fetch_add(n as u64, Ordering::AcqRel);
                    return Ok(n);
                }
                ReadOutcome::Eof => return Ok(0),
                ReadOutcome::WouldBlock => {
                    match shared.strategy.wait_for_data(1, self.settings.read_timeout()) {
                        WaitOutcome::Ready(_) | WaitOutcome::EndOfInput(_) => {}
                        WaitOutcome::TimedOut(_) => {
                            warn!(
                                source = %shared.source_id,
                                pos = shared.read_pos.load(Ordering::Acquire),
                                "timeout waiting for data"
                            );
                            return Err(CacheError::Timeout);
                        }
                    }
                }
            }
        }
    }

    /// Move the read position.
    ///
    /// Positions inside the cached window are served in place. When the
    /// source cannot seek, the position moves to the nearest cached one and
    /// that position is returned.
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidSeek`] for a target before the start
    /// - [`CacheError::SeekFailed`] if the source refused to seek
    /// - [`CacheError::NotRunning`] if the fill thread has exited
    /// - [`CacheError::Timeout`] if data up to the target did not arrive
    pub fn seek(&mut self, pos: SeekFrom) -> CacheResult<u64> {
        let shared = Arc::clone(self.shared()?);
        let current = shared.read_pos.load(Ordering::Acquire);
        let file_size = shared.file_size.load(Ordering::Acquire);

        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => current.checked_add_signed(delta),
            SeekFrom::End(delta) => file_size.checked_add_signed(delta),
        }
        .ok_or(CacheError::InvalidSeek)?;

        if target == current {
            return Ok(target);
        }

        if let SeekOutcome::OutOfRange { nearest } = shared.strategy.seek(target) {
            if !shared.seek_possible.load(Ordering::Acquire) {
                debug!(source = %shared.source_id, target, nearest, "source cannot seek");
                let _ = shared.strategy.seek(nearest);
                shared.read_pos.store(nearest, Ordering::Release);
                return Ok(nearest);
            }
            self.seek_through_source(&shared, target, file_size)?;
        }

        shared.read_pos.store(target, Ordering::Release);
        Ok(target)
    }

    fn seek_through_source(&self, shared: &Shared, target: u64, file_size: u64) -> CacheResult<()> {
        // Never request closer to the end than one chunk; small tail reads
        // (tags, indexes) then come from a single fetch.
        let requested = if file_size > 0 {
            target.min(file_size.saturating_sub(shared.chunk_size as u64))
        } else {
            target
        };

        shared.request_seek(requested);
        let response = loop {
            let running = shared.is_running();
            if let Some(response) = shared.wait_seek_response(self.settings.seek_poll()) {
                break response;
            }
            if !running {
                warn!(source = %shared.source_id, target, "seek while fill thread is not running");
                return Err(CacheError::NotRunning);
            }
        };

        let SeekResponse::Done { pos } = response else {
            return Err(CacheError::SeekFailed { target });
        };
        shared.read_pos.store(pos, Ordering::Release);

        if requested < target {
            let remaining = target - requested;
            debug!(source = %shared.source_id, target, remaining, "waiting for data up to target");
            let outcome = shared
                .strategy
                .wait_for_data(remaining, self.settings.read_timeout());
            if outcome.available() < remaining {
                warn!(source = %shared.source_id, target, "failed to get remaining data");
                return Err(CacheError::Timeout);
            }
            let _ = shared.strategy.seek(target);
        }
        Ok(())
    }

    /// Current read position; `0` when closed.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.shared()
            .map_or(0, |s| s.read_pos.load(Ordering::Acquire))
    }

    /// Source length as last seen by the fill thread; `0` if unknown.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.shared()
            .map_or(0, |s| s.file_size.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answer a control request.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotOpen`] without an open session,
    /// [`CacheError::UnsupportedControl`] for source-only requests.
    pub fn io_control(&self, request: IoControl) -> CacheResult<IoReply> {
        self.handle()?.io_control(request)
    }

    /// Handle for status and rate control from other threads.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotOpen`] without an open session.
    pub fn handle(&self) -> CacheResult<CacheHandle> {
        self.shared().map(|s| CacheHandle::new(Arc::clone(s)))
    }
}

impl<S: Source> Drop for FileCache<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Source> io::Read for FileCache<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FileCache::read(self, buf).map_err(Into::into)
    }
}

impl<S: Source> io::Seek for FileCache<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        FileCache::seek(self, pos).map_err(Into::into)
    }
}
