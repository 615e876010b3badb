//! Cache tuning
//!
//! Durations serialize as `{ "secs": .., "nanos": .. }`, the serde default
//! for [`Duration`].

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and chunking parameters shared by every resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Idle time after which GC closes sources and drops evictable payloads
    pub file_ttl: Duration,
    /// Minimum spacing of GC passes; also the worker's wait timeout
    pub gc_interval: Duration,
    /// Frames per decoded chunk
    pub chunk_frames: u64,
    /// Chunks at the start of a sample loaded on first use and never evicted
    pub initial_chunks: u64,
    /// Look-ahead of follow-up preloads and the eviction radius
    pub followup_chunks: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_ttl: Duration::from_secs(30),
            gc_interval: Duration::from_secs(1),
            chunk_frames: 1024,
            initial_chunks: 8,
            followup_chunks: 32,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the idle TTL
    #[must_use]
    pub const fn with_file_ttl(mut self, ttl: Duration) -> Self {
        self.file_ttl = ttl;
        self
    }

    /// Set the GC interval
    #[must_use]
    pub const fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Set frames per chunk
    #[must_use]
    pub const fn with_chunk_frames(mut self, frames: u64) -> Self {
        self.chunk_frames = frames;
        self
    }

    /// Set the number of always-warm leading chunks
    #[must_use]
    pub const fn with_initial_chunks(mut self, chunks: u64) -> Self {
        self.initial_chunks = chunks;
        self
    }

    /// Set the follow-up window
    #[must_use]
    pub const fn with_followup_chunks(mut self, chunks: u64) -> Self {
        self.followup_chunks = chunks;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> CacheResult<()> {
        if self.chunk_frames == 0 {
            return Err(CacheError::InvalidConfiguration(
                "chunk_frames must be greater than 0".to_string(),
            ));
        }

        if self.gc_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "gc_interval must be greater than 0".to_string(),
            ));
        }

        if self.followup_chunks == 0 {
            return Err(CacheError::InvalidConfiguration(
                "followup_chunks must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
