//! Streaming audio resource cache.
//!
//! A real-time consumer reads fixed-size byte ranges ("DMA reads") from
//! assets that may live in plain files, zip archives or compressed disk
//! images. This crate decouples where the bytes live from how they are
//! served:
//!
//! - **Blobs and banks**: whole files cached in memory once fully read or
//!   preloaded; banks add a device base address to every read
//! - **Disk image assets**: blobs over a window of a fingerprinted image
//! - **Streaming samples**: compressed audio decoded into fixed-size frame
//!   chunks on demand and served one track at a time as big-endian PCM
//!
//! A background [`Scheduler`] keeps touched resources warm and
//! garbage-collects idle ones. [`AudioCache`] ties the filesystem, the
//! [`Registry`] and the scheduler together; [`abi`] wraps it in
//! primitive-typed functions for the game-side consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use resound::{AudioCache, CacheConfig, CacheStrategy, DmaRequest};
//! use resound_decoder::{CodecType, Metadata};
//!
//! let cache = AudioCache::new(CacheConfig::default())?;
//! cache.set_default_directory("/opt/game/mods");
//! cache.add_allowed_directory("music");
//!
//! let (id, meta) = cache.register_audio(
//!     CacheStrategy::Default,
//!     CodecType::Auto,
//!     "music",
//!     "title.ogg",
//!     Metadata::default(),
//! )?;
//!
//! let mut pcm = vec![0u8; 2 * 512];
//! cache.dma(id, &mut pcm, &DmaRequest::new(0, 512).with_args(0, 0))?;
//! cache.tick();
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

pub mod abi;
pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod strategy;
pub mod task;

pub use cache::AudioCache;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use registry::{INVALID_RESOURCE_ID, Registry, ResourceId};
pub use resource::{
    BankResource, BlobResource, CachedResource, ChunkLayout, DmaRequest, Resource, SampleResource,
};
pub use scheduler::Scheduler;
pub use strategy::{CacheStrategy, ResourceKind};
pub use task::{CacheState, PreloadPayload, PreloadTask};
