#![forbid(unsafe_code)]

use bitflags::bitflags;

bitflags! {
    /// Flags passed to [`Source::open`](crate::Source::open).
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        /// The source must not install its own cache.
        const NO_CACHE = 0b0000_0001;
        /// Reads may return fewer bytes than requested.
        const TRUNCATED = 0b0000_0010;
        /// Reads should follow the source's natural chunk size.
        const CHUNKED = 0b0000_0100;
        /// The stream is audio/video and may keep growing while open.
        const AUDIO_VIDEO = 0b0000_1000;
        /// Several demuxer streams read from distant offsets at once.
        const MULTI_STREAM = 0b0001_0000;
    }
}

impl OpenFlags {
    /// Flags the cache always opens its source with.
    pub const CACHE_SOURCE: Self = Self::NO_CACHE.union(Self::TRUNCATED).union(Self::CHUNKED);

    /// The subset of flags that describe the content rather than the read mode.
    #[must_use]
    pub fn classification(self) -> Self {
        self & (Self::AUDIO_VIDEO | Self::MULTI_STREAM)
    }
}
