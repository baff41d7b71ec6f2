#![forbid(unsafe_code)]

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::CacheResult;

const MIB: usize = 1024 * 1024;

/// Tuning knobs for [`FileCache`](crate::FileCache).
///
/// Every field has a default, so a TOML document only needs the keys it
/// changes:
///
/// ```toml
/// memory_size = 4194304
/// write_rate = 0
/// read_timeout_ms = 2000
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Memory budget in bytes. `0` selects the unbounded disk cache.
    pub memory_size: usize,
    /// Minimum chunk size in bytes; the source's own chunk size wins if larger.
    pub chunk_size: usize,
    /// Allowed lead over the reader, as a multiple of `write_rate`.
    pub read_factor: f64,
    /// Initial fill-rate cap in bytes per second. `0` disables the cap.
    pub write_rate: u32,
    /// How long a consumer read waits for data before timing out.
    pub read_timeout_ms: u64,
    /// Poll interval while waiting for a seek acknowledgement.
    pub seek_poll_ms: u64,
    /// Wait between rate-limiter checks.
    pub rate_poll_ms: u64,
    /// Wait after a transient source stall before retrying.
    pub stall_retry_ms: u64,
    /// Wait for the consumer to free write space.
    pub space_wait_ms: u64,
    /// Startup bias added to elapsed time in the average fill rate.
    pub rate_bias_ms: u64,
    /// Forward fill level above which the cache stops counting as filling.
    pub fill_high: f64,
    /// Forward fill level below which the cache counts as filling again.
    pub fill_low: f64,
    /// Directory for the disk cache file. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_size: 20 * MIB,
            chunk_size: 128 * 1024,
            read_factor: 4.0,
            write_rate: 1024 * 1024,
            read_timeout_ms: 10_000,
            seek_poll_ms: 100,
            rate_poll_ms: 100,
            stall_retry_ms: 2000,
            space_wait_ms: 5,
            rate_bias_ms: 1000,
            fill_high: 0.8,
            fill_low: 0.2,
            temp_dir: None,
        }
    }
}

impl CacheSettings {
    /// Parse settings from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`](crate::CacheError::Config) on malformed
    /// input or unknown keys.
    pub fn from_toml_str(s: &str) -> CacheResult<Self> {
        Ok(toml::from_str(s)?)
    }

    #[must_use]
    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    #[must_use]
    pub fn with_read_factor(mut self, factor: f64) -> Self {
        self.read_factor = factor;
        self
    }

    /// Set the initial fill-rate cap (bytes/s, `0` = unlimited).
    #[must_use]
    pub fn with_write_rate(mut self, rate: u32) -> Self {
        self.write_rate = rate;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = millis(timeout);
        self
    }

    #[must_use]
    pub fn with_seek_poll(mut self, interval: Duration) -> Self {
        self.seek_poll_ms = millis(interval);
        self
    }

    #[must_use]
    pub fn with_rate_poll(mut self, interval: Duration) -> Self {
        self.rate_poll_ms = millis(interval);
        self
    }

    #[must_use]
    pub fn with_stall_retry(mut self, interval: Duration) -> Self {
        self.stall_retry_ms = millis(interval);
        self
    }

    #[must_use]
    pub fn with_rate_bias(mut self, bias: Duration) -> Self {
        self.rate_bias_ms = millis(bias);
        self
    }

    /// Set the fill hysteresis thresholds as fractions of forward capacity.
    #[must_use]
    pub fn with_fill_levels(mut self, low: f64, high: f64) -> Self {
        self.fill_low = low;
        self.fill_high = high;
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn seek_poll(&self) -> Duration {
        Duration::from_millis(self.seek_poll_ms.max(1))
    }

    #[must_use]
    pub fn rate_poll(&self) -> Duration {
        Duration::from_millis(self.rate_poll_ms.max(1))
    }

    #[must_use]
    pub fn stall_retry(&self) -> Duration {
        Duration::from_millis(self.stall_retry_ms)
    }

    #[must_use]
    pub fn space_wait(&self) -> Duration {
        Duration::from_millis(self.space_wait_ms.max(1))
    }

    #[must_use]
    pub fn rate_bias(&self) -> Duration {
        Duration::from_millis(self.rate_bias_ms)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
