//! Cached resources
//!
//! A resource answers three questions for the scheduler and the consumer:
//!
//! - **DMA**: copy bytes at an offset into a caller buffer
//! - **Preload tasks**: what background work would make later reads cheaper
//! - **GC**: release whatever idle time and the strategy allow
//!
//! The variant set is closed. [`Resource`] dispatches to the variant and
//! [`CachedResource`] is the shared contract.

mod bank;
mod blob;
mod sample;

pub use bank::BankResource;
pub use blob::BlobResource;
pub use sample::{ChunkLayout, SampleResource};

use crate::error::CacheResult;
use crate::strategy::{CacheStrategy, ResourceKind};
use crate::task::{CacheState, PreloadTask};
use std::time::Instant;

/// One DMA request.
///
/// `arg1` and `arg2` depend on the variant: banks take their device base
/// address in `arg1`, samples take the track index in `arg1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaRequest {
    /// Byte offset (blobs, banks) or frame offset (samples)
    pub offset: u64,
    /// Bytes (blobs, banks) or frames (samples) to copy
    pub length: u64,
    /// First variant-specific argument
    pub arg1: u64,
    /// Second variant-specific argument
    pub arg2: u64,
}

impl DmaRequest {
    /// Request without variant arguments
    pub const fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            arg1: 0,
            arg2: 0,
        }
    }

    /// Set the variant arguments
    #[must_use]
    pub const fn with_args(mut self, arg1: u64, arg2: u64) -> Self {
        self.arg1 = arg1;
        self.arg2 = arg2;
        self
    }
}

/// Operations every resource variant implements.
///
/// Implementations do their own locking; callers share resources through
/// `Arc` and never hold an outer lock across these calls.
pub trait CachedResource: Send + Sync {
    /// Copy the requested range into `target`.
    ///
    /// On error `target` is left as it was.
    fn dma(&self, target: &mut [u8], request: &DmaRequest) -> CacheResult<()>;

    /// Background work worth doing now. Recomputed from current state.
    fn preload_tasks(&self) -> Vec<PreloadTask>;

    /// Run one task previously returned by [`preload_tasks`](Self::preload_tasks).
    fn run_preload_task(&self, task: &PreloadTask) -> CacheResult<()>;

    /// Close idle sources and drop evictable payloads as of `now`.
    fn gc(&self, now: Instant);

    /// Current lifecycle state.
    fn state(&self) -> CacheState;

    /// Resolved cache strategy.
    fn strategy(&self) -> CacheStrategy;
}

/// A registered resource
#[derive(Debug)]
pub enum Resource {
    /// Whole-file cache over a native file or archive member
    Blob(BlobResource),
    /// Whole-file cache over a disk image window
    DiskImage(BlobResource),
    /// Offset-addressed bank
    Bank(BankResource),
    /// Chunked decoded audio
    Sample(SampleResource),
}

impl Resource {
    fn inner(&self) -> &dyn CachedResource {
        match self {
            Self::Blob(blob) | Self::DiskImage(blob) => blob,
            Self::Bank(bank) => bank,
            Self::Sample(sample) => sample,
        }
    }

    /// Kind of resource
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Blob(_) => ResourceKind::Blob,
            Self::DiskImage(_) => ResourceKind::DiskImage,
            Self::Bank(_) => ResourceKind::Bank,
            Self::Sample(_) => ResourceKind::Sample,
        }
    }

    /// The sample variant, if this is one
    pub fn as_sample(&self) -> Option<&SampleResource> {
        match self {
            Self::Sample(sample) => Some(sample),
            _ => None,
        }
    }

    /// The blob behind blob, disk image and bank variants
    pub fn as_blob(&self) -> Option<&BlobResource> {
        match self {
            Self::Blob(blob) | Self::DiskImage(blob) => Some(blob),
            Self::Bank(bank) => Some(bank.blob()),
            Self::Sample(_) => None,
        }
    }
}

impl CachedResource for Resource {
    fn dma(&self, target: &mut [u8], request: &DmaRequest) -> CacheResult<()> {
        self.inner().dma(target, request)
    }

    fn preload_tasks(&self) -> Vec<PreloadTask> {
        self.inner().preload_tasks()
    }

    fn run_preload_task(&self, task: &PreloadTask) -> CacheResult<()> {
        self.inner().run_preload_task(task)
    }

    fn gc(&self, now: Instant) {
        self.inner().gc(now);
    }

    fn state(&self) -> CacheState {
        self.inner().state()
    }

    fn strategy(&self) -> CacheStrategy {
        self.inner().strategy()
    }
}
