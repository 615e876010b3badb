//! Disk-image asset table

use crate::error::{VfsError, VfsResult};
use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Physical start value marking an entry whose data is not in the image
pub const ABSENT_PHYSICAL_START: u32 = 0xFFFF_FFFF;

/// Size of one table entry on disk
pub const ASSET_ENTRY_SIZE: u64 = 16;

/// Upper bound on table length, guards against a runaway scan
pub const MAX_ASSET_ENTRIES: usize = 0x10000;

/// One asset table entry (16 bytes, big-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct AssetEntry {
    /// First virtual address of the asset
    pub virtual_start: u32,
    /// One past the last virtual address
    pub virtual_end: u32,
    /// Offset of the asset data in the image
    pub physical_start: u32,
    /// End of the compressed data, zero when stored uncompressed
    pub physical_end: u32,
}

impl AssetEntry {
    /// Entry is marked as not present in this image
    pub const fn is_absent(&self) -> bool {
        self.physical_start == ABSENT_PHYSICAL_START
    }

    /// Entry data is Yaz0-compressed
    pub const fn is_compressed(&self) -> bool {
        self.physical_end != 0
    }

    /// Whether `offset` lies in this entry's virtual range
    pub fn contains(&self, offset: u64) -> bool {
        u64::from(self.virtual_start) <= offset && offset < u64::from(self.virtual_end)
    }

    /// Decompressed size of the asset
    pub const fn virtual_size(&self) -> u64 {
        self.virtual_end.saturating_sub(self.virtual_start) as u64
    }

    const fn is_terminator(&self) -> bool {
        self.virtual_start == 0
            && self.virtual_end == 0
            && self.physical_start == 0
            && self.physical_end == 0
    }
}

/// Ordered list of asset entries, terminated on disk by an all-zero entry.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    entries: Vec<AssetEntry>,
}

impl AssetTable {
    /// Parse the table at `offset`.
    ///
    /// The first entry describes the table's own container and must have
    /// virtual start, physical start and physical end all zero.
    pub fn parse<R: Read + Seek>(reader: &mut R, offset: u64, path: &Path) -> VfsResult<Self> {
        reader.seek(SeekFrom::Start(offset))?;

        let first = AssetEntry::read(reader)?;
        if first.virtual_start != 0 || first.physical_start != 0 || first.physical_end != 0 {
            return Err(VfsError::parse(
                path,
                format!("asset table at 0x{offset:X} does not start with a self entry: {first:?}"),
            ));
        }

        let mut entries = vec![first];
        loop {
            let entry = AssetEntry::read(reader)
                .map_err(|e| VfsError::parse(path, format!("unterminated asset table: {e}")))?;
            if entry.is_terminator() {
                break;
            }
            if entries.len() >= MAX_ASSET_ENTRIES {
                return Err(VfsError::parse(
                    path,
                    format!("asset table exceeds {MAX_ASSET_ENTRIES} entries"),
                ));
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// First entry whose virtual range contains `offset`.
    pub fn find(&self, offset: u64) -> Option<(usize, &AssetEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.contains(offset))
    }

    /// Entry by table index.
    pub fn get(&self, index: usize) -> Option<&AssetEntry> {
        self.entries.get(index)
    }

    /// Number of entries, excluding the terminator.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
