#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used by `readahead-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by cache strategies.
///
/// A strategy error on the write path is unrecoverable for the fill thread.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache strategy is not open")]
    NotOpen,

    #[error("failed to allocate {size} bytes of cache memory")]
    Allocation { size: usize },

    #[error("cache strategy failed: {0}")]
    Failed(String),
}
