#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

/// Accumulating byte-rate meter over a moving stream position.
///
/// Each [`rate`](Self::rate) call adds the bytes and time since the previous
/// call, so the result is an average over everything since the last full
/// reset. The `*_at` variants take the timestamp explicitly for tests.
#[derive(Clone, Debug)]
pub struct WriteRate {
    stamp: Instant,
    pos: u64,
    bytes: u64,
    elapsed: Duration,
}

impl Default for WriteRate {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteRate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stamp: Instant::now(),
            pos: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Rebase at `pos`. A `full` reset also forgets the accumulated average.
    pub fn reset(&mut self, pos: u64, full: bool) {
        self.reset_at(pos, full, Instant::now());
    }

    pub fn reset_at(&mut self, pos: u64, full: bool, now: Instant) {
        self.stamp = now;
        self.pos = pos;
        if full {
            self.bytes = 0;
            self.elapsed = Duration::ZERO;
        }
    }

    /// Average rate in bytes/s up to `pos`, with `bias` added to the elapsed
    /// time so that a burst right after a reset does not read as a huge rate.
    ///
    /// Returns `0` until some time has accumulated.
    pub fn rate(&mut self, pos: u64, bias: Duration) -> u32 {
        self.rate_at(pos, bias, Instant::now())
    }

    pub fn rate_at(&mut self, pos: u64, bias: Duration, now: Instant) -> u32 {
        self.bytes += pos.saturating_sub(self.pos);
        self.elapsed += now.saturating_duration_since(self.stamp);
        self.pos = pos;
        self.stamp = now;

        let elapsed_ms = self.elapsed.as_millis();
        if elapsed_ms == 0 {
            return 0;
        }
        let rate = u128::from(self.bytes) * 1000 / (elapsed_ms + bias.as_millis());
        u32::try_from(rate).unwrap_or(u32::MAX)
    }
}
