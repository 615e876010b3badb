use super::{ArchiveContainer, MemberInfo};
use crate::error::VfsResult;
use crate::file::{ByteSource, clamp_len, resolve_seek};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemberState {
    open: bool,
    position: u64,
    extracted: Option<Vec<u8>>,
}

/// One member of a shared [`ArchiveContainer`].
///
/// Stored members are read in place. Deflated members are extracted into an
/// owned buffer on open and the buffer is dropped again on close.
#[derive(Debug)]
pub struct ArchiveFile {
    container: Arc<ArchiveContainer>,
    member: MemberInfo,
    path: PathBuf,
    state: Mutex<MemberState>,
}

impl ArchiveFile {
    /// Resolve `name` in `container`.
    pub fn new(container: Arc<ArchiveContainer>, name: &str) -> VfsResult<Self> {
        let member = container.locate(name)?;
        let path = container.path().join(name);
        Ok(Self {
            container,
            member,
            path,
            state: Mutex::new(MemberState::default()),
        })
    }

    /// Resolved member location.
    pub fn member(&self) -> &MemberInfo {
        &self.member
    }

    /// Whether an extraction buffer is currently held.
    pub fn is_extracted(&self) -> bool {
        self.state.lock().extracted.is_some()
    }

    fn ensure_open(&self, state: &mut MemberState) -> VfsResult<()> {
        if self.member.compressed && state.extracted.is_none() {
            state.extracted = Some(self.container.extract(&self.member)?);
        }
        state.open = true;
        Ok(())
    }

    fn read_locked(&self, state: &mut MemberState, buf: &mut [u8]) -> VfsResult<usize> {
        self.ensure_open(state)?;

        let n = match &state.extracted {
            Some(data) => {
                let len = clamp_len(state.position, buf.len(), self.member.size);
                let start = state.position as usize;
                buf[..len].copy_from_slice(&data[start..start + len]);
                len
            }
            None => self
                .container
                .read_stored(&self.member, state.position, buf)?,
        };

        state.position += n as u64;
        Ok(n)
    }
}

impl ByteSource for ArchiveFile {
    fn open(&self) -> VfsResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&mut state)
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.position = 0;
        state.extracted = None;
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
        state.position = resolve_seek(pos, state.position, self.member.size);
        Ok(state.position)
    }

    fn tell(&self) -> u64 {
        self.state.lock().position
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        state.position = offset.min(self.member.size);
        self.read_locked(&mut state, buf)
    }

    fn size(&self) -> u64 {
        self.member.size
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
