//! Sandboxed path resolution

use crate::archive::{ArchiveFile, has_archive_magic};
use crate::container_cache::ContainerCache;
use crate::disk_image::DiskImageFile;
use crate::error::{VfsError, VfsResult};
use crate::file::VfsFile;
use crate::native::NativeFile;
use crate::path::{extension_lowercase, has_parent_segment, is_within, normalize, to_archive_name};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extensions treated as zip-packed directories out of the box
pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

#[derive(Debug)]
struct FilesystemConfig {
    default_dir: PathBuf,
    allowed_dirs: Vec<PathBuf>,
    archive_extensions: HashSet<String>,
}

/// Resolves `(base_dir, relative_path)` pairs to byte sources.
///
/// A base directory is usable only if it equals or lies below one of the
/// allowed roots, and the relative path may not climb out of it. Both checks
/// are lexical and happen before anything is opened.
#[derive(Debug)]
pub struct Filesystem {
    config: RwLock<FilesystemConfig>,
    known_archives: RwLock<HashSet<PathBuf>>,
    containers: Arc<ContainerCache>,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem {
    /// Filesystem with its own container cache and no allowed roots.
    pub fn new() -> Self {
        Self::with_containers(Arc::new(ContainerCache::new()))
    }

    /// Filesystem sharing an existing container cache.
    pub fn with_containers(containers: Arc<ContainerCache>) -> Self {
        Self {
            config: RwLock::new(FilesystemConfig {
                default_dir: PathBuf::from("."),
                allowed_dirs: Vec::new(),
                archive_extensions: DEFAULT_ARCHIVE_EXTENSIONS
                    .iter()
                    .map(|ext| (*ext).to_string())
                    .collect(),
            }),
            known_archives: RwLock::new(HashSet::new()),
            containers,
        }
    }

    /// Container cache used for archives and disk images.
    pub fn containers(&self) -> &Arc<ContainerCache> {
        &self.containers
    }

    /// Root that relative or empty base directories are joined to.
    pub fn set_default_dir(&self, dir: impl AsRef<Path>) {
        let dir = normalize(dir.as_ref());
        debug!("Default directory set to {}", dir.display());
        self.config.write().default_dir = dir;
    }

    /// Current default root.
    pub fn default_dir(&self) -> PathBuf {
        self.config.read().default_dir.clone()
    }

    /// Allow access to `dir` and everything below it.
    pub fn add_allowed_dir(&self, dir: impl AsRef<Path>) {
        let dir = self.resolve_base(dir.as_ref());
        debug!("Allowed directory {}", dir.display());
        let mut config = self.config.write();
        if !config.allowed_dirs.contains(&dir) {
            config.allowed_dirs.push(dir);
        }
    }

    /// Treat files with this extension as zip-packed directories.
    pub fn add_archive_extension(&self, ext: &str) {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() {
            self.config.write().archive_extensions.insert(ext);
        }
    }

    /// Register a disk image content hash and the offset of its asset table.
    pub fn register_container_fingerprint(&self, fingerprint: &str, table_offset: u64) {
        self.containers.register_fingerprint(fingerprint, table_offset);
    }

    /// Resolve a base directory against the default root.
    pub fn resolve_base(&self, base: &Path) -> PathBuf {
        if base.as_os_str().is_empty() || base.is_relative() {
            normalize(&self.config.read().default_dir.join(base))
        } else {
            normalize(base)
        }
    }

    /// Whether a resolved directory equals or lies below an allowed root.
    pub fn is_path_allowed(&self, path: &Path) -> bool {
        self.config
            .read()
            .allowed_dirs
            .iter()
            .any(|root| is_within(path, root))
    }

    /// Apply both sandbox checks and return the resolved base and relative path.
    fn sandbox(&self, base_dir: &str, relative: &str) -> VfsResult<(PathBuf, PathBuf)> {
        let base = self.resolve_base(Path::new(base_dir));
        if !self.is_path_allowed(&base) {
            warn!("Rejected access to {}", base.display());
            return Err(VfsError::PathNotAllowed(base));
        }

        let rel = normalize(Path::new(relative));
        let escapes = rel.as_os_str().is_empty()
            || has_parent_segment(&rel)
            || rel
                .components()
                .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
        if escapes {
            warn!("Rejected path '{}' below {}", relative, base.display());
            return Err(VfsError::PathEscapesBase {
                path: relative.to_string(),
                base,
            });
        }

        Ok((base, rel))
    }

    /// Whether `path` is a zip-packed directory, by extension or signature.
    pub fn is_archive(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        if self.known_archives.read().contains(path) {
            return true;
        }

        let by_extension = extension_lowercase(path)
            .is_some_and(|ext| self.config.read().archive_extensions.contains(&ext));
        if by_extension || has_archive_magic(path) {
            self.known_archives.write().insert(path.to_path_buf());
            return true;
        }
        false
    }

    /// Open `relative` below `base_dir`, looking inside archives as needed.
    pub fn open_file(&self, base_dir: &str, relative: &str) -> VfsResult<VfsFile> {
        let (base, rel) = self.sandbox(base_dir, relative)?;

        if self.is_archive(&base) {
            let container = self.containers.archive(&base)?;
            let name = to_archive_name(&rel);
            debug!("Opening {} from archive {}", name, base.display());
            return Ok(VfsFile::Archive(ArchiveFile::new(container, &name)?));
        }

        Ok(VfsFile::Native(NativeFile::new(base.join(rel))?))
    }

    /// Open a window of the disk image at `relative` below `base_dir`.
    ///
    /// `size` of `None` extends the window to the end of the asset entry
    /// containing `virtual_offset`.
    pub fn open_disk_image_file(
        &self,
        base_dir: &str,
        relative: &str,
        virtual_offset: u64,
        size: Option<u64>,
    ) -> VfsResult<VfsFile> {
        let (base, rel) = self.sandbox(base_dir, relative)?;
        let container = self.containers.disk_image(&base.join(rel))?;
        Ok(VfsFile::DiskImage(DiskImageFile::new(
            container,
            virtual_offset,
            size,
        )?))
    }
}
