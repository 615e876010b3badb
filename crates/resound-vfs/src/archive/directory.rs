//! Zip central directory structures

use crate::error::{VfsError, VfsResult};
use binrw::BinRead;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Local file header signature `PK\x03\x04`
pub const LOCAL_HEADER_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// End of central directory signature `PK\x05\x06`
pub const END_OF_DIRECTORY_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// Fixed part of a local file header
pub const LOCAL_HEADER_SIZE: u64 = 30;

/// Fixed part of the end of central directory record
const END_OF_DIRECTORY_SIZE: u64 = 22;

/// Longest possible archive comment
const MAX_COMMENT_SIZE: u64 = 0xFFFF;

/// Stored (uncompressed)
pub const METHOD_STORED: u16 = 0;

/// Deflate
pub const METHOD_DEFLATE: u16 = 8;

/// End of central directory record
#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"PK\x05\x06")]
pub struct EndOfDirectory {
    /// Number of this disk
    pub disk_number: u16,
    /// Disk holding the central directory
    pub directory_disk: u16,
    /// Entries on this disk
    pub disk_entries: u16,
    /// Total entries
    pub total_entries: u16,
    /// Central directory size in bytes
    pub directory_size: u32,
    /// Central directory offset
    pub directory_offset: u32,
    /// Archive comment length
    pub comment_len: u16,
}

/// Central directory file header
#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"PK\x01\x02")]
pub struct DirectoryEntry {
    /// Creator version
    pub version_made_by: u16,
    /// Minimum version to extract
    pub version_needed: u16,
    /// General purpose flags
    pub flags: u16,
    /// Compression method
    pub method: u16,
    /// DOS time
    pub mod_time: u16,
    /// DOS date
    pub mod_date: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// File name length
    pub name_len: u16,
    /// Extra field length
    pub extra_len: u16,
    /// Comment length
    pub comment_len: u16,
    /// Disk number start
    pub disk_start: u16,
    /// Internal attributes
    pub internal_attrs: u16,
    /// External attributes
    pub external_attrs: u32,
    /// Offset of the local header
    pub local_header_offset: u32,
    /// Raw file name
    #[br(count = usize::from(name_len))]
    pub name: Vec<u8>,
    /// Extra field
    #[br(count = usize::from(extra_len))]
    pub extra: Vec<u8>,
    /// File comment
    #[br(count = usize::from(comment_len))]
    pub comment: Vec<u8>,
}

impl DirectoryEntry {
    /// File name, with backslashes folded to `/`.
    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(&self.name).replace('\\', "/")
    }
}

/// Local file header, without the variable-length name and extra field
#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"PK\x03\x04")]
pub struct LocalHeader {
    /// Minimum version to extract
    pub version_needed: u16,
    /// General purpose flags
    pub flags: u16,
    /// Compression method
    pub method: u16,
    /// DOS time
    pub mod_time: u16,
    /// DOS date
    pub mod_date: u16,
    /// CRC-32
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// File name length
    pub name_len: u16,
    /// Extra field length
    pub extra_len: u16,
}

impl LocalHeader {
    /// Offset of member data relative to the start of this header.
    pub fn data_offset(&self) -> u64 {
        LOCAL_HEADER_SIZE + u64::from(self.name_len) + u64::from(self.extra_len)
    }
}

/// Read every central directory entry of a zip stream.
pub fn read_directory<R: Read + Seek>(reader: &mut R, path: &Path) -> VfsResult<Vec<DirectoryEntry>> {
    let size = reader.seek(SeekFrom::End(0))?;
    if size < END_OF_DIRECTORY_SIZE {
        return Err(VfsError::parse(path, "file too small to be a zip archive"));
    }

    // The record sits at the very end, followed only by the archive comment.
    let tail_len = size.min(END_OF_DIRECTORY_SIZE + MAX_COMMENT_SIZE);
    let tail_start = size - tail_len;
    let mut tail = vec![0u8; tail_len as usize];
    reader.seek(SeekFrom::Start(tail_start))?;
    reader.read_exact(&mut tail)?;

    let record_pos = tail
        .windows(4)
        .rposition(|window| window == END_OF_DIRECTORY_MAGIC)
        .ok_or_else(|| VfsError::parse(path, "end of central directory not found"))?;

    let eocd = EndOfDirectory::read(&mut Cursor::new(&tail[record_pos..]))?;
    if eocd.total_entries == 0xFFFF || eocd.directory_offset == 0xFFFF_FFFF {
        return Err(VfsError::parse(path, "zip64 archives are not supported"));
    }
    if eocd.disk_number != 0 || eocd.directory_disk != 0 {
        return Err(VfsError::parse(path, "multi-disk archives are not supported"));
    }

    reader.seek(SeekFrom::Start(u64::from(eocd.directory_offset)))?;
    let mut entries = Vec::with_capacity(usize::from(eocd.total_entries));
    for i in 0..eocd.total_entries {
        let entry = DirectoryEntry::read(reader)
            .map_err(|e| VfsError::parse(path, format!("bad central directory entry {i}: {e}")))?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Read the local header at `offset`.
pub fn read_local_header<R: Read + Seek>(reader: &mut R, offset: u64) -> VfsResult<LocalHeader> {
    reader.seek(SeekFrom::Start(offset))?;
    Ok(LocalHeader::read(reader)?)
}
