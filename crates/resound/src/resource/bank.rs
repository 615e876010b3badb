//! Offset-addressed banks
//!
//! Several logical banks can live in one physical file. The consumer
//! addresses each bank relative to its own device base, which arrives with
//! every DMA call in `arg1`.

use super::blob::{BlobResource, dma_window};
use super::{CachedResource, DmaRequest};
use crate::error::{CacheError, CacheResult};
use crate::strategy::CacheStrategy;
use crate::task::{CacheState, PreloadTask};
use std::time::Instant;

/// Whole-file cache addressed as `device base + offset`
#[derive(Debug)]
pub struct BankResource {
    blob: BlobResource,
}

impl BankResource {
    /// Bank over an existing blob
    pub fn new(blob: BlobResource) -> Self {
        Self { blob }
    }

    /// The underlying whole-file cache
    pub fn blob(&self) -> &BlobResource {
        &self.blob
    }
}

impl CachedResource for BankResource {
    fn dma(&self, target: &mut [u8], request: &DmaRequest) -> CacheResult<()> {
        let offset = request.offset.checked_add(request.arg1).ok_or_else(|| {
            CacheError::InvalidRequest(format!(
                "bank address 0x{:X}+0x{:X} overflows",
                request.arg1, request.offset
            ))
        })?;
        self.blob.read(dma_window(target, request.length)?, offset)
    }

    fn preload_tasks(&self) -> Vec<PreloadTask> {
        self.blob.preload_tasks()
    }

    fn run_preload_task(&self, task: &PreloadTask) -> CacheResult<()> {
        self.blob.run_preload_task(task)
    }

    fn gc(&self, now: Instant) {
        self.blob.gc(now);
    }

    fn state(&self) -> CacheState {
        self.blob.state()
    }

    fn strategy(&self) -> CacheStrategy {
        self.blob.strategy()
    }
}
