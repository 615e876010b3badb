use super::DiskImageContainer;
use crate::error::VfsResult;
use crate::file::{ByteSource, clamp_len, resolve_seek};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct WindowState {
    open: bool,
    position: u64,
}

/// A window of `size` bytes starting at a virtual offset of a disk image.
///
/// There is no per-file handle; the container owns the image stream, so
/// `open` only marks the window as in use.
#[derive(Debug)]
pub struct DiskImageFile {
    container: Arc<DiskImageContainer>,
    path: PathBuf,
    virtual_offset: u64,
    size: u64,
    state: Mutex<WindowState>,
}

impl DiskImageFile {
    /// Create a window. `size` of `None` extends to the end of the asset
    /// entry containing `virtual_offset`.
    pub fn new(
        container: Arc<DiskImageContainer>,
        virtual_offset: u64,
        size: Option<u64>,
    ) -> VfsResult<Self> {
        let size = match size {
            Some(size) => size,
            None => container.remaining_in_entry(virtual_offset)?,
        };
        let path = container
            .path()
            .join(format!("{virtual_offset:08X}"));

        Ok(Self {
            container,
            path,
            virtual_offset,
            size,
            state: Mutex::new(WindowState::default()),
        })
    }

    /// Virtual offset of the first byte of this window.
    pub fn virtual_offset(&self) -> u64 {
        self.virtual_offset
    }

    /// Container backing this window.
    pub fn container(&self) -> &Arc<DiskImageContainer> {
        &self.container
    }

    fn read_locked(&self, state: &mut WindowState, buf: &mut [u8]) -> VfsResult<usize> {
        state.open = true;
        let len = clamp_len(state.position, buf.len(), self.size);

        // A window may span consecutive asset entries.
        let mut filled = 0;
        while filled < len {
            let offset = self.virtual_offset + state.position;
            let n = self.container.read_virtual(offset, &mut buf[filled..len])?;
            if n == 0 {
                break;
            }
            filled += n;
            state.position += n as u64;
        }
        Ok(filled)
    }
}

impl ByteSource for DiskImageFile {
    fn open(&self) -> VfsResult<()> {
        self.state.lock().open = true;
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.position = 0;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
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
