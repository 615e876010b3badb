//! Byte source abstraction shared by every file variant

use crate::archive::ArchiveFile;
use crate::disk_image::DiskImageFile;
use crate::error::VfsResult;
use crate::native::NativeFile;
use crate::path::extension_lowercase;
use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

/// A seekable, readable byte stream of known size.
///
/// Every operation takes `&self`; implementations guard their state with an
/// internal lock so one source can be shared between the scheduler thread and
/// callers. `open` is idempotent and `close` resets the tracked position.
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Acquire the underlying handle. No-op if already open.
    fn open(&self) -> VfsResult<()>;

    /// Release the underlying handle and reset the position to zero.
    fn close(&self);

    /// Whether the underlying handle is currently held.
    fn is_open(&self) -> bool;

    /// Read at the current position, clamped at end of file.
    fn read(&self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Move the position. The result is clamped to `[0, size]`.
    fn seek(&self, pos: SeekFrom) -> VfsResult<u64>;

    /// Current position.
    fn tell(&self) -> u64;

    /// Read at an absolute offset without disturbing other readers.
    ///
    /// Opens the source if needed. Returns fewer bytes than requested only at
    /// end of file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Path this source was resolved from.
    fn path(&self) -> &Path;

    /// Lowercase file extension, used for codec selection.
    fn extension(&self) -> Option<String> {
        extension_lowercase(self.path())
    }
}

/// Resolve a `SeekFrom` against a position and size, clamping to `[0, size]`.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> u64 {
    let target = match pos {
        SeekFrom::Start(offset) => i128::from(offset),
        SeekFrom::Current(delta) => i128::from(current) + i128::from(delta),
        SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    target.clamp(0, i128::from(size)) as u64
}

/// Number of bytes readable from `offset` in a source of `size` bytes.
pub(crate) fn clamp_len(offset: u64, want: usize, size: u64) -> usize {
    let remaining = size.saturating_sub(offset);
    usize::try_from(remaining).map_or(want, |remaining| want.min(remaining))
}

/// The closed set of files the [`Filesystem`](crate::Filesystem) hands out.
#[derive(Debug)]
pub enum VfsFile {
    /// Plain on-disk file
    Native(NativeFile),
    /// Member of a zip archive
    Archive(ArchiveFile),
    /// Window into a disk image
    DiskImage(DiskImageFile),
}

impl VfsFile {
    fn inner(&self) -> &dyn ByteSource {
        match self {
            Self::Native(file) => file,
            Self::Archive(file) => file,
            Self::DiskImage(file) => file,
        }
    }
}

impl ByteSource for VfsFile {
    fn open(&self) -> VfsResult<()> {
        self.inner().open()
    }

    fn close(&self) {
        self.inner().close();
    }

    fn is_open(&self) -> bool {
        self.inner().is_open()
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner().read(buf)
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        self.inner().seek(pos)
    }

    fn tell(&self) -> u64 {
        self.inner().tell()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner().read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.inner().size()
    }

    fn path(&self) -> &Path {
        self.inner().path()
    }
}
