//! Resource cache error types

use crate::registry::ResourceId;
use resound_decoder::DecoderError;
use resound_vfs::VfsError;
use thiserror::Error;

/// Errors raised by resources, the registry and the scheduler
#[derive(Debug, Error)]
pub enum CacheError {
    /// DMA asked for a track the stream does not have
    #[error("track {track} out of range, stream has {tracks}")]
    InvalidTrack {
        /// Requested track
        track: u64,
        /// Tracks in the stream
        tracks: u32,
    },

    /// No resource is registered under this id
    #[error("invalid resource id {0}")]
    InvalidResourceId(ResourceId),

    /// Every resource id has been handed out
    #[error("resource ids exhausted")]
    RegistryFull,

    /// Request outside the resource or with an undersized target
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected by `CacheConfig::validate`
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The background worker could not be started
    #[error("failed to start scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Path resolution, container or byte source failure
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Probe or decode failure
    #[error(transparent)]
    Decoder(#[from] DecoderError),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
