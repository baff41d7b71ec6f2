#![forbid(unsafe_code)]

//! `readahead-source`
//!
//! The byte-source side of the read-ahead cache:
//! - [`Source`]: blocking open/read/seek/len contract the fill thread pulls from
//! - [`OpenFlags`]: open-time hints (caching, chunking, media classification)
//! - [`IoControl`] / [`IoReply`]: the out-of-band control protocol shared by
//!   sources and caches
//! - [`LocalFileSource`]: a plain local-file implementation

mod control;
mod error;
mod flags;
mod local;
mod location;
mod source;

pub use control::{CacheStatus, IoControl, IoReply};
pub use error::{SourceError, SourceResult};
pub use flags::OpenFlags;
pub use local::LocalFileSource;
pub use location::redact;
#[cfg(feature = "mock")]
pub use source::MockSource;
pub use source::Source;
