//! Plain on-disk files

use crate::error::VfsResult;
use crate::file::{ByteSource, clamp_len, resolve_seek};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
struct NativeState {
    handle: Option<File>,
    position: u64,
}

/// A file read directly from the host filesystem.
#[derive(Debug)]
pub struct NativeFile {
    path: PathBuf,
    size: u64,
    state: Mutex<NativeState>,
}

impl NativeFile {
    /// Stat the file and build a closed handle to it.
    pub fn new(path: impl Into<PathBuf>) -> VfsResult<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self {
            path,
            size,
            state: Mutex::new(NativeState::default()),
        })
    }

    fn ensure_open(&self, state: &mut NativeState) -> VfsResult<()> {
        if state.handle.is_none() {
            debug!("Opening {}", self.path.display());
            state.handle = Some(File::open(&self.path)?);
            state.position = 0;
        }
        Ok(())
    }

    fn read_locked(&self, state: &mut NativeState, buf: &mut [u8]) -> VfsResult<usize> {
        self.ensure_open(state)?;
        let len = clamp_len(state.position, buf.len(), self.size);
        let position = state.position;

        let Some(handle) = state.handle.as_mut() else {
            return Ok(0);
        };
        handle.seek(SeekFrom::Start(position))?;

        let mut filled = 0;
        while filled < len {
            let n = handle.read(&mut buf[filled..len])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        state.position += filled as u64;
        Ok(filled)
    }
}

impl ByteSource for NativeFile {
    fn open(&self) -> VfsResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&mut state)
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.handle.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
        state.position = 0;
    }

    fn is_open(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        self.read_locked(&mut state, buf)
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        let mut state = self.state.lock();
        state.position = resolve_seek(pos, state.position, self.size);
        Ok(state.position)
    }

    fn tell(&self) -> u64 {
        self.state.lock().position
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        state.position = offset.min(self.size);
        self.read_locked(&mut state, buf)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents)
            .unwrap();
        (dir, path)
    }

    #[test]
    fn test_open_is_idempotent() {
        let (_dir, path) = fixture(b"0123456789");
        let file = NativeFile::new(&path).unwrap();

        file.open().unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();
        file.open().unwrap();
        assert!(file.is_open());
        assert_eq!(file.tell(), 4);

        file.close();
        assert!(!file.is_open());
        assert_eq!(file.tell(), 0);
    }

    #[test]
    fn test_read_clamps_at_eof() {
        let (_dir, path) = fixture(b"0123456789");
        let file = NativeFile::new(&path).unwrap();

        let mut buf = [0u8; 8];
        file.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"789");
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_at_reopens_after_close() {
        let (_dir, path) = fixture(b"0123456789");
        let file = NativeFile::new(&path).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(2, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"2345");
        file.close();
        assert_eq!(file.read_at(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"6789");
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NativeFile::new(dir.path().join("missing.bin")).is_err());
    }
}
