#![forbid(unsafe_code)]

use readahead_source::SourceError;
use readahead_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("cache is not open")]
    NotOpen,

    /// No data arrived within the read timeout. Retryable; distinct from a
    /// zero-length read at end of stream.
    #[error("timed out waiting for cached data")]
    Timeout,

    #[error("fill thread is not running")]
    NotRunning,

    #[error("source seek to {target} failed")]
    SeekFailed { target: u64 },

    #[error("seek to a negative position")]
    InvalidSeek,

    #[error("unsupported control request")]
    UnsupportedControl,

    #[error("failed to spawn fill thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid cache settings: {0}")]
    Config(#[from] toml::de::Error),
}

impl CacheError {
    /// Whether the same call may succeed if repeated later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<CacheError> for std::io::Error {
    fn from(err: CacheError) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            CacheError::Timeout => ErrorKind::TimedOut,
            CacheError::InvalidSeek => ErrorKind::InvalidInput,
            CacheError::NotOpen | CacheError::NotRunning => ErrorKind::NotConnected,
            CacheError::UnsupportedControl => ErrorKind::Unsupported,
            _ => ErrorKind::Other,
        };
        Self::new(kind, err)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
