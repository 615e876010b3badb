//! Cache strategies

use std::fmt;

/// When a resource materializes its payload and whether it may drop it again.
///
/// The numeric values are the boundary encoding; unknown values mean
/// [`CacheStrategy::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum CacheStrategy {
    /// Pick the resource kind's usual strategy
    #[default]
    Default = 0,
    /// Serve every read from the source; never preload
    None = 1,
    /// Load everything as soon as the resource is registered; never evict
    Preload = 2,
    /// Load once touched; evict after the idle TTL
    PreloadOnUse = 3,
    /// Load once touched; keep until teardown
    PreloadOnUseNoEvict = 4,
}

/// Resource kinds with different default strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Whole file
    Blob,
    /// Offset-addressed bank over a file
    Bank,
    /// Window into a disk image
    DiskImage,
    /// Chunked decoded audio
    Sample,
}

impl CacheStrategy {
    /// Decode the boundary value.
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Preload,
            3 => Self::PreloadOnUse,
            4 => Self::PreloadOnUseNoEvict,
            _ => Self::Default,
        }
    }

    /// Replace `Default` with the kind's usual strategy.
    pub fn resolve(self, kind: ResourceKind) -> Self {
        match (self, kind) {
            (Self::Default, ResourceKind::DiskImage) => Self::Preload,
            (Self::Default, _) => Self::PreloadOnUse,
            (strategy, _) => strategy,
        }
    }

    /// Whether payloads may be dropped by GC.
    pub fn evicts(self) -> bool {
        matches!(self, Self::None | Self::PreloadOnUse)
    }

    /// Whether reads may populate a cache at all.
    pub fn caches(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::None => "none",
            Self::Preload => "preload",
            Self::PreloadOnUse => "preload-on-use",
            Self::PreloadOnUseNoEvict => "preload-on-use-no-evict",
        };
        f.write_str(name)
    }
}
