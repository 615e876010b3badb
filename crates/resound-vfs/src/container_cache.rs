//! Shared, de-duplicated container instances

use crate::archive::ArchiveContainer;
use crate::disk_image::DiskImageContainer;
use crate::error::VfsResult;
use crate::path::normalize;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Parsed archives and disk images keyed by normalized path.
///
/// Two first accesses racing on the same path may both parse it; only the
/// first result to be published is kept and the other is dropped.
#[derive(Debug, Default)]
pub struct ContainerCache {
    archives: RwLock<HashMap<PathBuf, Arc<ArchiveContainer>>>,
    disk_images: RwLock<HashMap<PathBuf, Arc<DiskImageContainer>>>,
    fingerprints: RwLock<HashMap<String, u64>>,
    parses: AtomicUsize,
}

impl ContainerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disk image content hash and the offset of its asset table.
    pub fn register_fingerprint(&self, fingerprint: &str, table_offset: u64) {
        let fingerprint = fingerprint.trim().to_ascii_lowercase();
        debug!("Registered container fingerprint {} -> 0x{:X}", fingerprint, table_offset);
        self.fingerprints.write().insert(fingerprint, table_offset);
    }

    /// Shared archive for `path`, parsing it on first use.
    pub fn archive(&self, path: &Path) -> VfsResult<Arc<ArchiveContainer>> {
        let key = normalize(path);
        if let Some(container) = self.archives.read().get(&key) {
            return Ok(Arc::clone(container));
        }

        let parsed = Arc::new(ArchiveContainer::open(&key)?);
        self.parses.fetch_add(1, Ordering::Relaxed);

        let mut archives = self.archives.write();
        Ok(Arc::clone(archives.entry(key).or_insert(parsed)))
    }

    /// Shared disk image for `path`, parsing it on first use.
    pub fn disk_image(&self, path: &Path) -> VfsResult<Arc<DiskImageContainer>> {
        let key = normalize(path);
        if let Some(container) = self.disk_images.read().get(&key) {
            return Ok(Arc::clone(container));
        }

        let fingerprints = self.fingerprints.read().clone();
        let parsed = Arc::new(DiskImageContainer::open(&key, &fingerprints)?);
        self.parses.fetch_add(1, Ordering::Relaxed);

        let mut images = self.disk_images.write();
        Ok(Arc::clone(images.entry(key).or_insert(parsed)))
    }

    /// Whether an archive for `path` has already been parsed.
    pub fn has_archive(&self, path: &Path) -> bool {
        self.archives.read().contains_key(&normalize(path))
    }

    /// Total number of container parses performed.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }
}
