//! Whole-file cache

use super::{CachedResource, DmaRequest};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::strategy::CacheStrategy;
use crate::task::{CacheState, PreloadPayload, PreloadTask};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use resound_vfs::{ByteSource, VfsError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Leading `length` bytes of `target`, or an error if it is too small.
pub(super) fn dma_window(target: &mut [u8], length: u64) -> CacheResult<&mut [u8]> {
    let available = target.len();
    usize::try_from(length)
        .ok()
        .and_then(|length| target.get_mut(..length))
        .ok_or_else(|| {
            CacheError::InvalidRequest(format!(
                "target holds {available} bytes, {length} requested"
            ))
        })
}

/// Fill `buf` from `offset`, failing if the source ends first.
fn read_fully(file: &dyn ByteSource, offset: u64, buf: &mut [u8]) -> CacheResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read_at(offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            return Err(VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "{} ended after {} of {} bytes at 0x{offset:X}",
                    file.path().display(),
                    filled,
                    buf.len()
                ),
            ))
            .into());
        }
        filled += n;
    }
    Ok(())
}

/// Caches a whole byte source in memory.
///
/// Reads are served from the cached copy when present. A read that covers
/// the entire file in one call is promoted to the cache, as is the result
/// of a whole-file preload task.
#[derive(Debug)]
pub struct BlobResource {
    file: Arc<dyn ByteSource>,
    strategy: CacheStrategy,
    ttl: Duration,
    cache: RwLock<Option<Bytes>>,
    last_access: Mutex<Option<Instant>>,
    announced: AtomicBool,
}

impl BlobResource {
    /// Blob over `file`. `strategy` should already be resolved.
    pub fn new(file: Arc<dyn ByteSource>, strategy: CacheStrategy, config: &CacheConfig) -> Self {
        Self {
            file,
            strategy,
            ttl: config.file_ttl,
            cache: RwLock::new(None),
            last_access: Mutex::new(None),
            announced: AtomicBool::new(false),
        }
    }

    /// Size of the underlying file
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    /// Underlying byte source
    pub fn file(&self) -> &Arc<dyn ByteSource> {
        &self.file
    }

    /// The cached file contents, shared without copying.
    pub fn cached(&self) -> Option<Bytes> {
        self.cache.read().clone()
    }

    fn touch(&self) {
        *self.last_access.lock() = Some(Instant::now());
    }

    /// Copy `target.len()` bytes starting at `offset` into `target`.
    pub fn read(&self, target: &mut [u8], offset: u64) -> CacheResult<()> {
        let size = self.size();
        let length = target.len() as u64;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= size)
            .ok_or_else(|| {
                CacheError::InvalidRequest(format!(
                    "range 0x{offset:X}+0x{length:X} exceeds {} bytes of {}",
                    size,
                    self.file.path().display()
                ))
            })?;
        self.touch();

        if let Some(data) = self.cache.read().as_ref() {
            target.copy_from_slice(&data[offset as usize..end as usize]);
            return Ok(());
        }

        let mut buf = vec![0u8; target.len()];
        self.file.open()?;
        read_fully(self.file.as_ref(), offset, &mut buf)?;
        target.copy_from_slice(&buf);

        if offset == 0 && length == size && self.strategy.caches() {
            debug!("Caching {} after full read", self.file.path().display());
            *self.cache.write() = Some(Bytes::from(buf));
        }
        Ok(())
    }

    fn load_whole(&self) -> CacheResult<()> {
        if self.cache.read().is_some() {
            return Ok(());
        }
        self.touch();

        let size = usize::try_from(self.size()).map_err(|_| {
            CacheError::InvalidRequest(format!("{} is too large to cache", self.file.path().display()))
        })?;
        let mut buf = vec![0u8; size];
        self.file.open()?;
        read_fully(self.file.as_ref(), 0, &mut buf)?;

        debug!("Preloaded {} ({} bytes)", self.file.path().display(), size);
        self.cache.write().get_or_insert_with(|| Bytes::from(buf));
        Ok(())
    }
}

impl CachedResource for BlobResource {
    fn dma(&self, target: &mut [u8], request: &DmaRequest) -> CacheResult<()> {
        self.read(dma_window(target, request.length)?, request.offset)
    }

    fn preload_tasks(&self) -> Vec<PreloadTask> {
        let first = !self.announced.swap(true, Ordering::AcqRel);
        if self.cache.read().is_some() {
            return Vec::new();
        }

        let wanted = match self.strategy {
            CacheStrategy::Preload => true,
            CacheStrategy::PreloadOnUse | CacheStrategy::PreloadOnUseNoEvict => !first,
            CacheStrategy::None | CacheStrategy::Default => false,
        };
        if wanted {
            vec![PreloadTask::new(0, PreloadPayload::WholeFile)]
        } else {
            Vec::new()
        }
    }

    fn run_preload_task(&self, task: &PreloadTask) -> CacheResult<()> {
        match task.payload {
            PreloadPayload::WholeFile => self.load_whole(),
            other => Err(CacheError::InvalidRequest(format!(
                "blob resources cannot run {other:?}"
            ))),
        }
    }

    fn gc(&self, now: Instant) {
        let idle = self
            .last_access
            .lock()
            .is_some_and(|last| now.saturating_duration_since(last) >= self.ttl);
        if !idle {
            return;
        }

        if self.file.is_open() {
            debug!("Closing idle {}", self.file.path().display());
            self.file.close();
        }
        if self.strategy == CacheStrategy::PreloadOnUse && self.cache.write().take().is_some() {
            debug!("Evicted {}", self.file.path().display());
        }
    }

    fn state(&self) -> CacheState {
        if self.cache.read().is_some() {
            CacheState::Warm
        } else if self.file.is_open() {
            CacheState::Opening
        } else {
            CacheState::Cold
        }
    }

    fn strategy(&self) -> CacheStrategy {
        self.strategy
    }
}
