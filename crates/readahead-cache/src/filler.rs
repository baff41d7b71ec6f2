#![forbid(unsafe_code)]

//! Background fill loop.
//!
//! Pulls chunks from the source into the strategy, services seek requests,
//! applies the fill-rate cap and tracks the filling/low-speed state. The
//! source is owned by the loop while it runs and handed back on exit.

use std::{
    io::SeekFrom,
    sync::{Arc, atomic::Ordering},
};

use readahead_source::{IoControl, IoReply, Source};
use tracing::{debug, error, trace, warn};

use crate::{
    CacheEvent, CacheSettings, WriteRate,
    shared::{SeekResponse, Shared, Wake},
};

/// How a pass over the loop body ended.
enum Step {
    Continue,
    Exit,
}

pub(crate) struct Filler<S: Source> {
    source: S,
    shared: Arc<Shared>,
    settings: CacheSettings,
    buf: Vec<u8>,
    average: WriteRate,
    limiter: WriteRate,
    /// The strategy failed; input must not be marked as ended on exit.
    failed: bool,
}

impl<S: Source> Filler<S> {
    pub(crate) fn new(source: S, shared: Arc<Shared>, settings: CacheSettings) -> Self {
        let chunk = shared.chunk_size;
        Self {
            source,
            shared,
            settings,
            buf: vec![0u8; chunk],
            average: WriteRate::new(),
            limiter: WriteRate::new(),
            failed: false,
        }
    }

    /// Run until stopped and return the source.
    pub(crate) fn run(mut self) -> S {
        let id = self.shared.source_id.clone();
        debug!(source = %id, chunk = self.shared.chunk_size, "fill thread started");

        self.average.reset(0, true);
        self.limiter.reset(0, true);

        while !self.shared.cancel.is_cancelled() {
            if let Step::Exit = self.step() {
                break;
            }
        }

        if !self.failed {
            // Wake readers blocked on data that will never come.
            self.shared.strategy.end_of_input();
        }
        self.shared.running.store(false, Ordering::Release);
        self.shared.publish(CacheEvent::FillerStopped);
        debug!(source = %id, failed = self.failed, "fill thread stopped");
        self.source
    }

    fn step(&mut self) -> Step {
        let shared = Arc::clone(&self.shared);
        let strategy = &shared.strategy;

        let file_size = self.source.len();
        shared.file_size.store(file_size, Ordering::Release);

        if let Some(target) = shared.take_seek_request() {
            self.service_seek(target, file_size);
        }

        if let Step::Exit = self.limit_rate() {
            return Step::Exit;
        }
        if shared.has_seek_request() {
            return Step::Continue;
        }

        let chunk = shared.chunk_size;
        let write_pos = shared.write_pos.load(Ordering::Acquire);
        #[allow(clippy::cast_possible_truncation)] // bounded by chunk
        let max_source_read = if file_size > 0 {
            file_size.saturating_sub(write_pos).min(chunk as u64) as usize
        } else {
            chunk
        };

        // Reading without room to store it would force the data to be
        // discarded and fetched again.
        if strategy.max_write_size(chunk) < max_source_read {
            strategy.wait_for_space(self.settings.space_wait());
            return Step::Continue;
        }

        let read = if max_source_read > 0 {
            self.source.read(&mut self.buf[..max_source_read])
        } else {
            Ok(0)
        };

        let n = match read {
            Ok(n) if n > 0 => n,
            other => return self.handle_no_data(other.err(), write_pos, file_size),
        };
        trace!(source = %shared.source_id, pos = write_pos, bytes = n, "chunk read");

        let mut total = 0;
        while !shared.cancel.is_cancelled() && total < n {
            match strategy.write(&self.buf[total..n]) {
                Ok(0) => {
                    strategy.wait_for_space(self.settings.space_wait());
                }
                Ok(written) => total += written,
                Err(e) => {
                    error!(source = %shared.source_id, error = %e, "cache write failed, stopping");
                    self.failed = true;
                    return Step::Exit;
                }
            }
            // A full cache would otherwise keep a pending seek waiting.
            if shared.has_seek_request() {
                break;
            }
        }

        let write_pos = write_pos + total as u64;
        shared.write_pos.store(write_pos, Ordering::Release);

        let actual = self.average.rate(write_pos, self.settings.rate_bias());
        shared.write_rate_actual.store(actual, Ordering::Release);
        self.update_filling(actual);

        Step::Continue
    }

    fn service_seek(&mut self, target: u64, file_size: u64) {
        let shared = Arc::clone(&self.shared);
        let strategy = &shared.strategy;

        let cache_end = strategy.cached_end_if_seek_to(target);
        let reaches_eof = file_size > 0 && cache_end == file_size;

        if !reaches_eof {
            match self.source.seek(SeekFrom::Start(cache_end)) {
                Ok(pos) if pos == cache_end => {}
                result => {
                    error!(
                        source = %shared.source_id,
                        pos = cache_end,
                        ?result,
                        "source seek failed"
                    );
                    let possible = matches!(
                        self.source.io_control(IoControl::SeekPossible),
                        Ok(IoReply::SeekPossible(true))
                    );
                    shared.seek_possible.store(possible, Ordering::Release);
                    shared.publish(CacheEvent::SeekFailed { position: target });
                    shared.answer_seek(SeekResponse::Failed);
                    return;
                }
            }
        }

        let full = strategy.reset(target, false);
        let write_pos = strategy.cached_end();
        shared.write_pos.store(write_pos, Ordering::Release);
        // The average can only start over from an empty cache.
        self.average.reset(write_pos, full);
        self.limiter.reset(write_pos, true);

        if full {
            debug!(source = %shared.source_id, pos = target, "cache reset for seek");
            shared.filling.store(true, Ordering::Release);
            shared.low_speed.store(false, Ordering::Release);
        }

        shared.publish(CacheEvent::SeekCompleted {
            position: target,
            full_reset: full,
        });
        shared.answer_seek(SeekResponse::Done { pos: target });
    }

    /// Hold back while the lead over the reader exceeds `rate * read_factor`
    /// and the fill is already at the cap.
    fn limit_rate(&mut self) -> Step {
        let shared = Arc::clone(&self.shared);

        loop {
            let rate = shared.write_rate.load(Ordering::Acquire);
            if rate == 0 {
                return Step::Continue;
            }

            let allowed = f64::from(rate) * self.settings.read_factor;
            let write_pos = shared.write_pos.load(Ordering::Acquire);
            #[allow(clippy::cast_precision_loss)]
            let lead = write_pos.saturating_sub(shared.read_pos.load(Ordering::Acquire)) as f64;

            if lead < allowed {
                self.limiter.reset(write_pos, true);
                return Step::Continue;
            }

            // Past the allowed lead the fill runs at the cap itself.
            let current = self.limiter.rate(write_pos, std::time::Duration::ZERO);
            if current < rate {
                return Step::Continue;
            }

            match shared.wait_for_seek_or_stop(Some(self.settings.rate_poll())) {
                Wake::Timeout => {}
                Wake::Seek => return Step::Continue,
                Wake::Stop => return Step::Exit,
            }
        }
    }

    fn handle_no_data(
        &mut self,
        err: Option<readahead_source::SourceError>,
        write_pos: u64,
        file_size: u64,
    ) -> Step {
        let shared = Arc::clone(&self.shared);
        let strategy = &shared.strategy;

        // Short of a known end with unread data still cached: assume a stall.
        if write_pos < file_size && strategy.available() > 0 {
            warn!(
                source = %shared.source_id,
                pos = write_pos,
                error = ?err,
                "source returned no data, will retry"
            );
            return match shared.wait_for_seek_or_stop(Some(self.settings.stall_retry())) {
                Wake::Stop => Step::Exit,
                Wake::Seek | Wake::Timeout => Step::Continue,
            };
        }

        if let Some(e) = &err {
            error!(source = %shared.source_id, pos = write_pos, error = %e, "source read failed");
        } else if file_size == 0 {
            debug!(source = %shared.source_id, pos = write_pos, "source returned no data, assuming eof");
        } else if write_pos < file_size {
            error!(source = %shared.source_id, pos = write_pos, "source returned no data before eof");
        } else {
            debug!(source = %shared.source_id, pos = write_pos, "source reached eof");
        }

        strategy.end_of_input();
        shared.publish(CacheEvent::EndOfInput { position: write_pos });

        match shared.wait_for_seek_or_stop(None) {
            Wake::Seek => {
                strategy.clear_end_of_input();
                Step::Continue
            }
            Wake::Stop | Wake::Timeout => Step::Exit,
        }
    }

    /// Hysteresis on the forward fill level.
    fn update_filling(&mut self, actual: u32) {
        let shared = &self.shared;
        if shared.forward_capacity == 0 {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let level = shared.strategy.available() as f64 / shared.forward_capacity as f64;
        let filling = shared.filling.load(Ordering::Acquire);

        if level > self.settings.fill_high {
            let target = shared.write_rate.load(Ordering::Acquire);
            if filling && actual < target {
                shared.low_speed.store(true, Ordering::Release);
                shared.publish(CacheEvent::LowSpeed { actual, target });
            }
            if filling {
                shared.filling.store(false, Ordering::Release);
                shared.publish(CacheEvent::FillingChanged { filling: false });
            }
        } else if level < self.settings.fill_low && !filling {
            shared.filling.store(true, Ordering::Release);
            shared.publish(CacheEvent::FillingChanged { filling: true });
        }
    }
}
