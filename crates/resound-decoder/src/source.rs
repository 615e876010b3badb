//! `std::io` view of a byte source

use crate::error::DecoderResult;
use resound_vfs::{ByteSource, VfsError};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use symphonia::core::io::MediaSource;

fn to_io(error: VfsError) -> io::Error {
    match error {
        VfsError::Io(error) => error,
        other => io::Error::other(other.to_string()),
    }
}

/// Adapts a shared [`ByteSource`] to `Read + Seek`.
///
/// The adapter uses the source's own position, so only one reader should be
/// active on a source at a time.
#[derive(Debug, Clone)]
pub struct SourceReader {
    source: Arc<dyn ByteSource>,
}

impl SourceReader {
    /// Open the source and rewind it.
    pub fn new(source: Arc<dyn ByteSource>) -> DecoderResult<Self> {
        source.open()?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self { source })
    }

    /// The wrapped source.
    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.read(buf).map_err(to_io)
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.source.seek(pos).map_err(to_io)
    }
}

impl MediaSource for SourceReader {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.source.size())
    }
}
