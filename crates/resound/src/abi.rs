//! Primitive-typed boundary for the game-side consumer
//!
//! Every function here takes plain integers and strings, reports success as
//! a `bool` and fills `#[repr(C)]` out-structures. Errors stop at this layer:
//! each failure is logged and turned into `false` plus
//! [`INVALID_RESOURCE_ID`]. DMA failures leave the target buffer as it was.

use crate::cache::AudioCache;
use crate::error::CacheResult;
use crate::registry::{INVALID_RESOURCE_ID, ResourceId};
use crate::resource::DmaRequest;
use crate::strategy::CacheStrategy;
use resound_decoder::{CodecType, Metadata};
use tracing::error;

/// Result of registering a byte-addressed resource
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Id to pass to [`dma`], or [`INVALID_RESOURCE_ID`]
    pub resource_id: ResourceId,
    /// Bytes addressable through DMA
    pub file_size: u64,
}

impl Default for ResourceInfo {
    fn default() -> Self {
        Self {
            resource_id: INVALID_RESOURCE_ID,
            file_size: 0,
        }
    }
}

/// Stream description passed in and out of [`register_audio_resource`]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFileInfo {
    /// Id to pass to [`dma`], or [`INVALID_RESOURCE_ID`]
    pub resource_id: ResourceId,
    /// Channels
    pub track_count: u32,
    /// Frames per second
    pub sample_rate: u32,
    /// Total frames
    pub sample_count: u64,
    /// Loop start frame
    pub loop_start: u64,
    /// Loop end frame
    pub loop_end: u64,
    /// -1 infinite, 0 none, N repeats
    pub loop_count: i32,
}

impl Default for AudioFileInfo {
    fn default() -> Self {
        Self {
            resource_id: INVALID_RESOURCE_ID,
            track_count: 0,
            sample_rate: 0,
            sample_count: 0,
            loop_start: 0,
            loop_end: 0,
            loop_count: 0,
        }
    }
}

impl From<&AudioFileInfo> for Metadata {
    fn from(info: &AudioFileInfo) -> Self {
        Self {
            track_count: info.track_count,
            sample_rate: info.sample_rate,
            sample_count: info.sample_count,
            loop_start: info.loop_start,
            loop_end: info.loop_end,
            loop_count: info.loop_count,
        }
    }
}

fn report_registration(
    what: &str,
    path: &str,
    result: CacheResult<(ResourceId, u64)>,
    out: &mut ResourceInfo,
) -> bool {
    match result {
        Ok((resource_id, file_size)) => {
            *out = ResourceInfo {
                resource_id,
                file_size,
            };
            true
        }
        Err(e) => {
            error!("Failed to register {} {}: {}", what, path, e);
            *out = ResourceInfo::default();
            false
        }
    }
}

/// Register a whole-file resource.
pub fn register_blob_resource(
    cache: &AudioCache,
    cache_strategy: u32,
    base_dir: &str,
    path: &str,
    out: &mut ResourceInfo,
) -> bool {
    let result = cache.register_blob(CacheStrategy::from_raw(cache_strategy), base_dir, path);
    report_registration("blob", path, result, out)
}

/// Register an offset-addressed bank.
pub fn register_bank_resource(
    cache: &AudioCache,
    cache_strategy: u32,
    base_dir: &str,
    path: &str,
    out: &mut ResourceInfo,
) -> bool {
    let result = cache.register_bank(CacheStrategy::from_raw(cache_strategy), base_dir, path);
    report_registration("bank", path, result, out)
}

/// Register a window of a disk image; `size` 0 means to the end of the
/// asset entry.
pub fn register_disk_image_resource(
    cache: &AudioCache,
    cache_strategy: u32,
    base_dir: &str,
    path: &str,
    virtual_offset: u64,
    size: u64,
    out: &mut ResourceInfo,
) -> bool {
    let result = cache.register_disk_image(
        CacheStrategy::from_raw(cache_strategy),
        base_dir,
        path,
        virtual_offset,
        size,
    );
    report_registration("disk image asset", path, result, out)
}

/// Register a streaming sample.
///
/// If `info` arrives with non-zero `track_count` and `sample_count` those
/// values are trusted and the stream is not probed. On return `info` holds
/// the metadata in effect and the new id.
pub fn register_audio_resource(
    cache: &AudioCache,
    cache_strategy: u32,
    codec_hint: u32,
    base_dir: &str,
    path: &str,
    info: &mut AudioFileInfo,
) -> bool {
    let result = cache.register_audio(
        CacheStrategy::from_raw(cache_strategy),
        CodecType::from_raw(codec_hint),
        base_dir,
        path,
        Metadata::from(&*info),
    );
    match result {
        Ok((resource_id, metadata)) => {
            *info = AudioFileInfo {
                resource_id,
                track_count: metadata.track_count,
                sample_rate: metadata.sample_rate,
                sample_count: metadata.sample_count,
                loop_start: metadata.loop_start,
                loop_end: metadata.loop_end,
                loop_count: metadata.loop_count,
            };
            true
        }
        Err(e) => {
            error!("Failed to register audio {}: {}", path, e);
            info.resource_id = INVALID_RESOURCE_ID;
            false
        }
    }
}

/// Copy `length` units from `offset` of a resource into `target`.
///
/// `arg1` is the bank's device base for banks and the track index for
/// samples; `arg2` is unused by the current variants.
pub fn dma(
    cache: &AudioCache,
    resource_id: ResourceId,
    target: &mut [u8],
    offset: u64,
    length: u64,
    arg1: u64,
    arg2: u64,
) -> bool {
    let request = DmaRequest::new(offset, length).with_args(arg1, arg2);
    match cache.dma(resource_id, target, &request) {
        Ok(()) => true,
        Err(e) => {
            error!(
                "DMA of resource {} at 0x{:X}+0x{:X} failed: {}",
                resource_id, offset, length, e
            );
            false
        }
    }
}

/// Signal one frame of host time.
pub fn tick(cache: &AudioCache) -> bool {
    cache.tick();
    true
}

/// Set the directory relative base directories resolve against.
pub fn set_default_directory(cache: &AudioCache, path: &str) -> bool {
    cache.set_default_directory(path);
    true
}

/// Allow base directories at or below `path`.
pub fn add_allowed_directory(cache: &AudioCache, path: &str) -> bool {
    cache.add_allowed_directory(path);
    true
}

/// Treat directories with extension `ext` as zip archives.
pub fn register_known_archive_extension(cache: &AudioCache, ext: &str) -> bool {
    if ext.trim_start_matches('.').is_empty() {
        error!("Ignoring empty archive extension");
        return false;
    }
    cache.register_archive_extension(ext);
    true
}

/// Recognise a disk image by its hex SHA-1 and locate its asset table.
pub fn register_known_container_fingerprint(
    cache: &AudioCache,
    content_hash: &str,
    table_offset: u64,
) -> bool {
    if content_hash.len() != 40 || !content_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        error!("Ignoring malformed container fingerprint '{}'", content_hash);
        return false;
    }
    cache.register_container_fingerprint(content_hash, table_offset);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn cache(root: &std::path::Path) -> AudioCache {
        let cache = AudioCache::manual(CacheConfig::default()).unwrap();
        assert!(set_default_directory(&cache, root.to_str().unwrap()));
        assert!(add_allowed_directory(&cache, "data"));
        cache
    }

    #[test]
    fn test_blob_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/seq.bin"), b"0123456789").unwrap();
        let cache = cache(dir.path());

        let mut info = ResourceInfo::default();
        assert!(register_blob_resource(&cache, 0, "data", "seq.bin", &mut info));
        assert_eq!(info.file_size, 10);

        let mut buf = [0u8; 3];
        assert!(dma(&cache, info.resource_id, &mut buf, 4, 3, 0, 0));
        assert_eq!(&buf, b"456");
        assert_eq!(cache.scheduler().pending_len(), 1);
        assert!(tick(&cache));
    }

    #[test]
    fn test_failures_report_invalid_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let cache = cache(dir.path());

        let mut info = ResourceInfo {
            resource_id: 3,
            file_size: 9,
        };
        assert!(!register_blob_resource(&cache, 0, "data", "../secret", &mut info));
        assert_eq!(info, ResourceInfo::default());
        assert!(!register_bank_resource(&cache, 0, "elsewhere", "a.bin", &mut info));

        let mut audio = AudioFileInfo::default();
        assert!(!register_audio_resource(&cache, 0, 0, "data", "missing.wav", &mut audio));
        assert_eq!(audio.resource_id, INVALID_RESOURCE_ID);

        let mut buf = [9u8; 4];
        assert!(!dma(&cache, 42, &mut buf, 0, 4, 0, 0));
        assert_eq!(buf, [9; 4]);
        assert!(cache.registry().is_empty());
    }

    #[test]
    fn test_configuration_validation() {
        let cache = AudioCache::manual(CacheConfig::default()).unwrap();
        assert!(register_known_archive_extension(&cache, ".pak"));
        assert!(!register_known_archive_extension(&cache, "."));
        assert!(register_known_container_fingerprint(
            &cache,
            "0123456789ABCDEF0123456789abcdef01234567",
            0x1000
        ));
        assert!(!register_known_container_fingerprint(&cache, "xyz", 0));
    }
}
