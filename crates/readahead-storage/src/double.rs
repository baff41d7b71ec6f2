#![forbid(unsafe_code)]

//! Two-region strategy for streams read at two distant offsets.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{CacheStrategy, ReadOutcome, SeekOutcome, StorageResult, WaitOutcome};

#[derive(Debug)]
struct Pair {
    current: Arc<dyn CacheStrategy>,
    previous: Option<Arc<dyn CacheStrategy>>,
}

/// Keeps a second strategy of the same kind so that jumping between two
/// regions (e.g. an index at the end of a file and the data at the start)
/// does not discard either.
///
/// Reads and writes go to the current strategy. A reset that the current
/// strategy cannot serve well swaps in the other one. The pair lock is held
/// only long enough to pick a strategy; blocking calls run unlocked.
#[derive(Debug)]
pub struct DoubleCache {
    pair: Mutex<Pair>,
}

impl DoubleCache {
    #[must_use]
    pub fn new(inner: Box<dyn CacheStrategy>) -> Self {
        Self {
            pair: Mutex::new(Pair {
                current: Arc::from(inner),
                previous: None,
            }),
        }
    }

    fn current(&self) -> Arc<dyn CacheStrategy> {
        Arc::clone(&self.pair.lock().current)
    }

    fn previous(&self) -> Option<Arc<dyn CacheStrategy>> {
        self.pair.lock().previous.clone()
    }
}

impl CacheStrategy for DoubleCache {
    fn open(&self) -> StorageResult<()> {
        let mut pair = self.pair.lock();
        if let Some(previous) = pair.previous.take() {
            previous.close();
        }
        pair.current.open()
    }

    fn close(&self) {
        let (current, previous) = {
            let pair = self.pair.lock();
            (Arc::clone(&pair.current), pair.previous.clone())
        };
        current.close();
        if let Some(previous) = previous {
            previous.close();
        }
    }

    fn max_write_size(&self, requested: usize) -> usize {
        self.current().max_write_size(requested)
    }

    fn write(&self, data: &[u8]) -> StorageResult<usize> {
        self.current().write(data)
    }

    fn read(&self, buf: &mut [u8]) -> StorageResult<ReadOutcome> {
        self.current().read(buf)
    }

    fn wait_for_data(&self, minimum: u64, timeout: Duration) -> WaitOutcome {
        self.current().wait_for_data(minimum, timeout)
    }

    fn available(&self) -> u64 {
        self.current().available()
    }

    fn seek(&self, pos: u64) -> SeekOutcome {
        // A miss in `current` is reported even when the other region holds
        // `pos`; the owner then resets, which swaps the two.
        self.current().seek(pos)
    }

    fn reset(&self, pos: u64, clear_anyway: bool) -> bool {
        let mut pair = self.pair.lock();

        let keep_current = !clear_anyway
            && pair.current.is_cached_position(pos)
            && pair.previous.as_ref().is_none_or(|previous| {
                !previous.is_cached_position(pos)
                    || pair.current.cached_end() >= previous.cached_end()
            });
        if keep_current {
            return pair.current.reset(pos, clear_anyway);
        }

        let Some(previous) = pair.previous.take() else {
            let fresh: Arc<dyn CacheStrategy> = Arc::from(pair.current.create_new());
            if let Err(e) = fresh.open() {
                warn!(error = %e, "second cache region unavailable, reusing current");
                return pair.current.reset(pos, clear_anyway);
            }
            debug!(pos, "opened second cache region");
            let full = fresh.reset(pos, clear_anyway);
            let old = std::mem::replace(&mut pair.current, fresh);
            pair.previous = Some(old);
            return full;
        };

        let full = previous.reset(pos, clear_anyway);
        let old = std::mem::replace(&mut pair.current, previous);
        pair.previous = Some(old);
        debug!(pos, full, "swapped cache regions");
        full
    }

    fn cached_end_if_seek_to(&self, pos: u64) -> u64 {
        let end = self.current().cached_end_if_seek_to(pos);
        match self.previous() {
            Some(previous) => end.max(previous.cached_end_if_seek_to(pos)),
            None => end,
        }
    }

    fn cached_end(&self) -> u64 {
        self.current().cached_end()
    }

    /// Either region counts; `seek` still only moves within `current`.
    fn is_cached_position(&self, pos: u64) -> bool {
        self.current().is_cached_position(pos)
            || self
                .previous()
                .is_some_and(|previous| previous.is_cached_position(pos))
    }

    fn end_of_input(&self) {
        self.current().end_of_input();
    }

    fn clear_end_of_input(&self) {
        let (current, previous) = {
            let pair = self.pair.lock();
            (Arc::clone(&pair.current), pair.previous.clone())
        };
        current.clear_end_of_input();
        if let Some(previous) = previous {
            previous.clear_end_of_input();
        }
    }

    fn is_end_of_input(&self) -> bool {
        self.current().is_end_of_input()
    }

    fn wait_for_space(&self, timeout: Duration) -> bool {
        self.current().wait_for_space(timeout)
    }

    fn create_new(&self) -> Box<dyn CacheStrategy> {
        Box::new(Self::new(self.current().create_new()))
    }
}
