//! Fingerprinted disk images with an embedded asset table
//!
//! A disk image is recognised by the SHA-1 of its full contents. The hash
//! selects the offset of the asset table, which maps virtual address ranges
//! onto physical ranges of the image. Compressed entries are expanded on
//! first touch and kept for the container's lifetime.

mod file;
pub mod table;

pub use file::DiskImageFile;
pub use table::{ABSENT_PHYSICAL_START, AssetEntry, AssetTable};

use crate::error::{VfsError, VfsResult};
use crate::yaz0;
use parking_lot::{Mutex, RwLock};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed disk image.
#[derive(Debug)]
pub struct DiskImageContainer {
    path: PathBuf,
    fingerprint: String,
    table: AssetTable,
    stream: Mutex<File>,
    decompressed: RwLock<HashMap<usize, Arc<[u8]>>>,
}

impl DiskImageContainer {
    /// Hash the image, look up its table offset and parse the asset table.
    pub fn open(path: &Path, fingerprints: &HashMap<String, u64>) -> VfsResult<Self> {
        let mut stream = File::open(path)?;
        let fingerprint = fingerprint(&mut stream)?;

        let Some(&table_offset) = fingerprints.get(&fingerprint) else {
            return Err(VfsError::UnknownFingerprint {
                path: path.to_path_buf(),
                fingerprint,
            });
        };

        let table = AssetTable::parse(&mut stream, table_offset, path)?;
        info!(
            "Parsed disk image {} ({}): {} assets",
            path.display(),
            fingerprint,
            table.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            fingerprint,
            table,
            stream: Mutex::new(stream),
            decompressed: RwLock::new(HashMap::new()),
        })
    }

    /// Image path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase hex SHA-1 of the image.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The asset table.
    pub fn table(&self) -> &AssetTable {
        &self.table
    }

    /// Locate the entry containing `offset`, rejecting absent entries.
    pub fn locate(&self, offset: u64) -> VfsResult<(usize, &AssetEntry)> {
        let (index, entry) = self
            .table
            .find(offset)
            .ok_or(VfsError::NoMatchingAsset(offset))?;
        if entry.is_absent() {
            return Err(VfsError::AssetAbsent { index, offset });
        }
        Ok((index, entry))
    }

    /// Bytes from `offset` to the end of its containing entry.
    pub fn remaining_in_entry(&self, offset: u64) -> VfsResult<u64> {
        let (_, entry) = self
            .table
            .find(offset)
            .ok_or(VfsError::NoMatchingAsset(offset))?;
        Ok(u64::from(entry.virtual_end) - offset)
    }

    /// Copy bytes at a virtual offset, never crossing the containing entry.
    pub fn read_virtual(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let (index, entry) = self.locate(offset)?;
        let within = offset - u64::from(entry.virtual_start);

        if entry.is_compressed() {
            let data = self.entry_data(index, entry)?;
            let start = usize::try_from(within).unwrap_or(usize::MAX).min(data.len());
            let n = buf.len().min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            return Ok(n);
        }

        let available = entry.virtual_size() - within;
        let n = usize::try_from(available).map_or(buf.len(), |a| buf.len().min(a));
        let physical = u64::from(entry.physical_start) + within;

        let mut stream = self.stream.lock();
        stream.seek(SeekFrom::Start(physical))?;
        let mut filled = 0;
        while filled < n {
            let read = stream.read(&mut buf[filled..n])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(filled)
    }

    /// Decompressed contents of a compressed entry, memoized by index.
    fn entry_data(&self, index: usize, entry: &AssetEntry) -> VfsResult<Arc<[u8]>> {
        if let Some(data) = self.decompressed.read().get(&index) {
            return Ok(Arc::clone(data));
        }

        let compressed_len = entry.physical_end.saturating_sub(entry.physical_start) as usize;
        if compressed_len <= yaz0::YAZ0_HEADER_SIZE {
            return Err(VfsError::parse(
                &self.path,
                format!("compressed asset {index} is only {compressed_len} bytes"),
            ));
        }

        let mut compressed = vec![0u8; compressed_len];
        {
            let mut stream = self.stream.lock();
            stream.seek(SeekFrom::Start(u64::from(entry.physical_start)))?;
            stream.read_exact(&mut compressed)?;
        }

        let data: Arc<[u8]> = yaz0::decompress(&compressed)?.into();
        debug!(
            "Decompressed asset {} of {}: {} -> {} bytes",
            index,
            self.path.display(),
            compressed_len,
            data.len()
        );

        let mut cache = self.decompressed.write();
        Ok(Arc::clone(cache.entry(index).or_insert(data)))
    }

    /// Number of entries expanded so far.
    pub fn decompressed_count(&self) -> usize {
        self.decompressed.read().len()
    }
}

/// Lowercase hex SHA-1 of a whole stream.
pub fn fingerprint<R: Read + Seek>(reader: &mut R) -> VfsResult<String> {
    reader.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha1::new();
    std::io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
