#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used by `readahead-source`.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors produced by source implementations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source is not open")]
    NotOpen,

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("operation not supported by source")]
    Unsupported,
}
