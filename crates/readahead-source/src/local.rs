#![forbid(unsafe_code)]

//! Local filesystem source.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::PathBuf,
};

use tracing::debug;
use url::Url;

use crate::{IoControl, IoReply, OpenFlags, Source, SourceError, SourceResult};

/// Natural read granularity reported for local files (64 KB).
const LOCAL_CHUNK_SIZE: usize = 64 * 1024;

/// [`Source`] reading a file from the local filesystem.
///
/// Accepts plain paths and `file://` URLs. The length is re-read from file
/// metadata on every `len()` call so files that are still being written
/// report their growth.
#[derive(Debug, Default)]
pub struct LocalFileSource {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl LocalFileSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(location: &str) -> SourceResult<PathBuf> {
        if location.starts_with("file:") {
            let url = Url::parse(location)
                .map_err(|e| SourceError::InvalidLocation(format!("{location}: {e}")))?;
            return url
                .to_file_path()
                .map_err(|()| SourceError::InvalidLocation(location.to_string()));
        }
        if location.contains("://") {
            return Err(SourceError::InvalidLocation(location.to_string()));
        }
        Ok(PathBuf::from(location))
    }

    fn file(&mut self) -> SourceResult<&mut File> {
        self.file.as_mut().ok_or(SourceError::NotOpen)
    }
}

impl Source for LocalFileSource {
    fn open(&mut self, location: &str, flags: OpenFlags) -> SourceResult<()> {
        self.close();
        let path = Self::resolve(location)?;
        let file = File::open(&path)?;
        debug!(path = %path.display(), ?flags, "local source opened");
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> SourceResult<usize> {
        Ok(self.file()?.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> SourceResult<u64> {
        Ok(self.file()?.seek(pos)?)
    }

    fn len(&self) -> u64 {
        self.file
            .as_ref()
            .and_then(|f| f.metadata().ok())
            .map_or(0, |m| m.len())
    }

    fn chunk_size(&self) -> usize {
        LOCAL_CHUNK_SIZE
    }

    fn io_control(&mut self, request: IoControl) -> SourceResult<IoReply> {
        match request {
            IoControl::SeekPossible => Ok(IoReply::SeekPossible(self.file.is_some())),
            IoControl::SetCache | IoControl::SetRetry(_) => Ok(IoReply::Done),
            IoControl::CacheStatus | IoControl::CacheSetRate(_) => Err(SourceError::Unsupported),
        }
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "local source closed");
        }
        self.path = None;
    }
}
