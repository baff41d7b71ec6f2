#![forbid(unsafe_code)]

use std::sync::{Arc, atomic::Ordering};

use readahead_source::{CacheStatus, IoControl, IoReply};

use crate::{CacheError, CacheResult, shared::Shared};

/// Cloneable view of an open cache for threads other than the consumer.
///
/// Stays valid after the cache is closed; it then reports the last state.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    shared: Arc<Shared>,
}

impl CacheHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Fill status. Reading it clears the low-speed flag.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            forward: self.shared.strategy.available(),
            max_rate: self.shared.write_rate.load(Ordering::Acquire),
            current_rate: self.shared.write_rate_actual.load(Ordering::Acquire),
            low_speed: self.shared.low_speed.swap(false, Ordering::AcqRel),
        }
    }

    /// Set the fill-rate cap in bytes/s. `0` removes the cap.
    pub fn set_rate(&self, rate: u32) {
        self.shared.write_rate.store(rate, Ordering::Release);
    }

    #[must_use]
    pub fn seek_possible(&self) -> bool {
        self.shared.seek_possible.load(Ordering::Acquire)
    }

    /// Whether the cache is still in its initial (or post-reset) fill phase.
    #[must_use]
    pub fn is_filling(&self) -> bool {
        self.shared.filling.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.shared.chunk_size
    }

    /// Read-ahead capacity; `0` for the unbounded disk cache.
    #[must_use]
    pub fn forward_capacity(&self) -> u64 {
        self.shared.forward_capacity
    }

    /// Answer a control request.
    ///
    /// # Errors
    ///
    /// [`CacheError::UnsupportedControl`] for requests aimed at sources.
    pub fn io_control(&self, request: IoControl) -> CacheResult<IoReply> {
        match request {
            IoControl::CacheStatus => Ok(IoReply::CacheStatus(self.status())),
            IoControl::CacheSetRate(rate) => {
                self.set_rate(rate);
                Ok(IoReply::Done)
            }
            IoControl::SeekPossible => Ok(IoReply::SeekPossible(self.seek_possible())),
            IoControl::SetCache | IoControl::SetRetry(_) => Err(CacheError::UnsupportedControl),
        }
    }
}
