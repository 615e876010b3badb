//! Preload tasks and cache lifecycle states

/// Work a resource would like done before it is needed.
///
/// Lower priorities run first. Tasks are recomputed on every scheduler pass,
/// so nothing tracks whether a task was issued before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadTask {
    /// Ascending: 0 runs before 1
    pub priority: u32,
    /// What to load
    pub payload: PreloadPayload,
}

/// What a preload task loads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadPayload {
    /// The whole file of a blob resource
    WholeFile,
    /// The leading chunks of a sample (all of them under `Preload`)
    InitialWindow,
    /// One decoded chunk starting at this frame
    Chunk(u64),
}

impl PreloadTask {
    /// Task with the given priority and payload
    pub const fn new(priority: u32, payload: PreloadPayload) -> Self {
        Self { priority, payload }
    }
}

/// Where a resource is in its payload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No payload and the source is closed
    Cold,
    /// The source is open but nothing is cached
    Opening,
    /// A payload is cached
    Warm,
}
