//! Zip-packed directories
//!
//! The central directory is read once when the container is opened. Member
//! offsets need a second read of the member's local header, so they are
//! resolved on first lookup and cached from then on.

pub mod directory;
mod file;

pub use file::ArchiveFile;

use crate::error::{VfsError, VfsResult};
use directory::{DirectoryEntry, METHOD_DEFLATE, METHOD_STORED};
use flate2::Crc;
use flate2::read::DeflateDecoder;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Resolved location of an archive member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberInfo {
    /// Position in the central directory
    pub index: usize,
    /// Uncompressed size
    pub size: u64,
    /// Size of the stored data
    pub compressed_size: u64,
    /// Absolute offset of the member data in the archive
    pub data_offset: u64,
    /// Member is deflated and must be extracted before reading
    pub compressed: bool,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
}

/// A parsed zip archive.
#[derive(Debug)]
pub struct ArchiveContainer {
    path: PathBuf,
    stream: Mutex<File>,
    entries: Vec<DirectoryEntry>,
    names: HashMap<String, usize>,
    resolved: RwLock<HashMap<usize, MemberInfo>>,
    extractions: AtomicUsize,
}

impl ArchiveContainer {
    /// Open an archive and read its central directory.
    pub fn open(path: &Path) -> VfsResult<Self> {
        let mut stream = File::open(path)?;
        let entries = directory::read_directory(&mut stream, path)?;

        let names = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.file_name(), index))
            .collect();

        info!("Parsed archive {}: {} members", path.display(), entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            stream: Mutex::new(stream),
            entries,
            names,
            resolved: RwLock::new(HashMap::new()),
            extractions: AtomicUsize::new(0),
        })
    }

    /// Archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of members in the central directory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a member with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of compressed members extracted so far.
    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::Relaxed)
    }

    /// Resolve a member, reading its local header on first use.
    pub fn locate(&self, name: &str) -> VfsResult<MemberInfo> {
        let index = *self
            .names
            .get(name)
            .ok_or_else(|| VfsError::MemberNotFound(name.to_string()))?;

        if let Some(info) = self.resolved.read().get(&index) {
            return Ok(*info);
        }

        let entry = &self.entries[index];
        let compressed = match entry.method {
            METHOD_STORED => false,
            METHOD_DEFLATE => true,
            method => {
                return Err(VfsError::UnsupportedCompression {
                    member: name.to_string(),
                    method,
                });
            }
        };
        if entry.compressed_size == 0xFFFF_FFFF || entry.uncompressed_size == 0xFFFF_FFFF {
            return Err(VfsError::parse(
                &self.path,
                format!("member {name} needs zip64 extensions"),
            ));
        }

        let header_offset = u64::from(entry.local_header_offset);
        let header = {
            let mut stream = self.stream.lock();
            directory::read_local_header(&mut *stream, header_offset)
        }
        .map_err(|e| VfsError::parse(&self.path, format!("bad local header for {name}: {e}")))?;

        let info = MemberInfo {
            index,
            size: u64::from(entry.uncompressed_size),
            compressed_size: u64::from(entry.compressed_size),
            data_offset: header_offset + header.data_offset(),
            compressed,
            crc32: entry.crc32,
        };
        debug!("Resolved {} in {}: {:?}", name, self.path.display(), info);

        let mut resolved = self.resolved.write();
        Ok(*resolved.entry(index).or_insert(info))
    }

    /// Positional read from a stored member.
    pub fn read_stored(&self, member: &MemberInfo, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let len = crate::file::clamp_len(offset, buf.len(), member.size);

        let mut stream = self.stream.lock();
        stream.seek(SeekFrom::Start(member.data_offset + offset))?;
        let mut filled = 0;
        while filled < len {
            let n = stream.read(&mut buf[filled..len])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Inflate a compressed member into memory and verify its checksum.
    pub fn extract(&self, member: &MemberInfo) -> VfsResult<Vec<u8>> {
        let mut compressed = vec![0u8; member.compressed_size as usize];
        {
            let mut stream = self.stream.lock();
            stream.seek(SeekFrom::Start(member.data_offset))?;
            stream.read_exact(&mut compressed)?;
        }

        let mut data = Vec::with_capacity(member.size as usize);
        DeflateDecoder::new(compressed.as_slice())
            .read_to_end(&mut data)
            .map_err(|e| VfsError::Decompression(format!("inflate failed: {e}")))?;

        if data.len() as u64 != member.size {
            return Err(VfsError::Decompression(format!(
                "member {} inflated to {} bytes, expected {}",
                member.index,
                data.len(),
                member.size
            )));
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != member.crc32 {
            return Err(VfsError::Decompression(format!(
                "member {} checksum mismatch: expected {:08x}, got {:08x}",
                member.index,
                member.crc32,
                crc.sum()
            )));
        }

        self.extractions.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Extracted member {} of {} ({} bytes)",
            member.index,
            self.path.display(),
            data.len()
        );
        Ok(data)
    }
}

/// Sniff the first four bytes of a file for a zip signature.
///
/// Directories and unreadable paths are never archives.
pub fn has_archive_magic(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .is_ok()
        && (magic == directory::LOCAL_HEADER_MAGIC || magic == directory::END_OF_DIRECTORY_MAGIC)
}
