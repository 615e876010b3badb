//! Chunked streaming samples
//!
//! Compressed audio is never cached as bytes. The decoder fills fixed-size
//! chunks of interleaved frames, keyed by the frame each chunk starts at, and
//! DMA reads pick one track out of the chunks they overlap.
//!
//! Preloading follows the read position: the first pass loads the leading
//! chunks, later passes load the chunks just ahead of the last read and wrap
//! to the loop start when looking past the loop end. GC evicts chunks the
//! playhead cannot reach within the follow window.

use super::blob::dma_window;
use super::{CachedResource, DmaRequest};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::strategy::CacheStrategy;
use crate::task::{CacheState, PreloadPayload, PreloadTask};
use parking_lot::{Mutex, RwLock};
use resound_decoder::{Decoder, DecoderError, Metadata};
use resound_vfs::ByteSource;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chunk geometry of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    /// Frames per chunk
    pub chunk_frames: u64,
    /// Chunks covering the whole sample
    pub chunk_count: u64,
    /// Chunk holding the loop start
    pub loop_start_chunk: u64,
    /// One past the chunk holding the last looped frame. Without a loop
    /// end this is `chunk_count`.
    pub loop_end_chunk: u64,
}

impl ChunkLayout {
    /// Layout of a sample described by `metadata`.
    pub fn new(metadata: &Metadata, chunk_frames: u64) -> Self {
        let chunk_frames = chunk_frames.max(1);
        let sample_count = metadata.sample_count;
        let chunk_count = sample_count.div_ceil(chunk_frames);

        let loop_end = match metadata.loop_end {
            0 => sample_count,
            end => end.min(sample_count),
        };
        let loop_end_chunk = loop_end.div_ceil(chunk_frames).min(chunk_count);
        let loop_start_chunk = (metadata.loop_start / chunk_frames).min(loop_end_chunk);

        Self {
            chunk_frames,
            chunk_count,
            loop_start_chunk,
            loop_end_chunk,
        }
    }

    /// Chunk index holding `frame`.
    pub fn chunk_of(&self, frame: u64) -> u64 {
        frame / self.chunk_frames
    }

    /// Whether the loop region covers at least one chunk.
    pub fn wraps(&self) -> bool {
        self.loop_end_chunk > self.loop_start_chunk
    }

    /// Up to `steps` chunk indices after `current`, in playback order.
    ///
    /// Past the loop end the sequence wraps to the loop start chunk whatever
    /// the loop count. The list stops once the wrapped sequence repeats, or
    /// at the loop end when the loop region is empty.
    pub fn follow_ups(&self, current: u64, steps: u64) -> Vec<u64> {
        let end = self.loop_end_chunk;
        let span = end - self.loop_start_chunk;

        let mut chunks = Vec::new();
        for step in 1..=steps {
            let mut chunk = current + step;
            if chunk >= end {
                if span == 0 {
                    break;
                }
                chunk = self.loop_start_chunk + (chunk - end) % span;
            }
            if chunks.contains(&chunk) {
                break;
            }
            chunks.push(chunk);
        }
        chunks
    }

    /// Chunks of playback between `current` and `chunk`, following the same
    /// wrap as [`follow_ups`](Self::follow_ups), or `None` if playback never
    /// reaches `chunk` again.
    pub fn distance(&self, current: u64, chunk: u64) -> Option<u64> {
        if chunk >= current {
            Some(chunk - current)
        } else if self.wraps() && chunk >= self.loop_start_chunk {
            Some(self.loop_end_chunk.saturating_sub(current) + (chunk - self.loop_start_chunk))
        } else {
            None
        }
    }
}

/// Decoded-chunk cache over one audio stream.
pub struct SampleResource {
    file: Arc<dyn ByteSource>,
    decoder: Box<dyn Decoder>,
    metadata: Metadata,
    layout: ChunkLayout,
    strategy: CacheStrategy,
    initial_chunks: u64,
    followup_chunks: u64,
    ttl: Duration,
    position: AtomicU64,
    last_access: Mutex<Option<Instant>>,
    announced: AtomicBool,
    chunks: RwLock<BTreeMap<u64, Arc<[i16]>>>,
}

impl fmt::Debug for SampleResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleResource")
            .field("file", &self.file.path())
            .field("metadata", &self.metadata)
            .field("strategy", &self.strategy)
            .field("chunks", &self.chunks.read().len())
            .finish_non_exhaustive()
    }
}

impl SampleResource {
    /// Sample over `decoder`, which reads from `file`.
    ///
    /// When `hint` already carries a track and frame count it is trusted
    /// as is; otherwise the stream is probed and closed again.
    pub fn open(
        file: Arc<dyn ByteSource>,
        decoder: Box<dyn Decoder>,
        strategy: CacheStrategy,
        config: &CacheConfig,
        hint: Metadata,
    ) -> CacheResult<Self> {
        let metadata = if hint.is_known() {
            let mut metadata = hint;
            if metadata.loop_end == 0 {
                metadata.loop_end = metadata.sample_count;
            }
            decoder.set_metadata(metadata);
            metadata
        } else {
            let metadata = decoder.probe()?;
            decoder.close();
            metadata
        };

        if metadata.track_count == 0 {
            return Err(CacheError::InvalidRequest(format!(
                "{} has no tracks",
                file.path().display()
            )));
        }

        info!(
            "Sample {}: {} tracks at {} Hz, {} frames, loop {}..{} x{}",
            file.path().display(),
            metadata.track_count,
            metadata.sample_rate,
            metadata.sample_count,
            metadata.loop_start,
            metadata.loop_end,
            metadata.loop_count
        );

        Ok(Self {
            file,
            decoder,
            layout: ChunkLayout::new(&metadata, config.chunk_frames),
            metadata,
            strategy,
            initial_chunks: config.initial_chunks,
            followup_chunks: config.followup_chunks,
            ttl: config.file_ttl,
            position: AtomicU64::new(0),
            last_access: Mutex::new(None),
            announced: AtomicBool::new(false),
            chunks: RwLock::new(BTreeMap::new()),
        })
    }

    /// Stream properties and loop points
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Chunk geometry
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Frame offset of the last DMA read
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Start frames of the cached chunks, ascending
    pub fn cached_chunks(&self) -> Vec<u64> {
        self.chunks.read().keys().copied().collect()
    }

    fn touch(&self) {
        *self.last_access.lock() = Some(Instant::now());
    }

    fn initial_window(&self) -> u64 {
        if self.strategy == CacheStrategy::Preload {
            self.layout.chunk_count
        } else {
            self.initial_chunks.min(self.layout.chunk_count)
        }
    }

    /// Decoded frames of the chunk starting at `offset`.
    ///
    /// Cache hits share the stored buffer; misses decode exactly one chunk,
    /// shortened only by the end of the stream.
    pub fn get_chunk(&self, offset: u64) -> CacheResult<Arc<[i16]>> {
        let chunk_frames = self.layout.chunk_frames;
        let sample_count = self.metadata.sample_count;
        if offset % chunk_frames != 0 || offset >= sample_count {
            return Err(CacheError::InvalidRequest(format!(
                "no chunk starts at frame {offset}"
            )));
        }

        if let Some(chunk) = self.chunks.read().get(&offset) {
            return Ok(Arc::clone(chunk));
        }

        let frames = chunk_frames.min(sample_count - offset) as usize;
        let mut buffer = vec![0i16; frames * self.metadata.track_count as usize];
        self.decoder.open()?;
        let produced = self.decoder.decode(&mut buffer, frames, offset)?;
        if produced < frames {
            return Err(DecoderError::ShortDecode {
                offset,
                requested: frames,
                produced,
            }
            .into());
        }

        debug!("Decoded chunk {} of {}", offset, self.file.path().display());
        let chunk: Arc<[i16]> = buffer.into();
        Ok(Arc::clone(self.chunks.write().entry(offset).or_insert(chunk)))
    }

    /// Frame offsets the next preload pass would load, in playback order.
    pub fn follow_up_offsets(&self) -> Vec<u64> {
        let current = self.layout.chunk_of(self.position());
        self.layout
            .follow_ups(current, self.followup_chunks)
            .into_iter()
            .map(|chunk| chunk * self.layout.chunk_frames)
            .collect()
    }

    fn is_evictable(&self, current: u64, chunk: u64) -> bool {
        chunk >= self.initial_chunks
            && chunk + 1 != current
            && self
                .layout
                .distance(current, chunk)
                .is_none_or(|distance| distance > self.followup_chunks)
    }
}

impl CachedResource for SampleResource {
    /// Copy `length` frames of track `arg1` from frame `offset` as
    /// big-endian 16-bit samples. Frames past the end of the stream are
    /// left untouched.
    fn dma(&self, target: &mut [u8], request: &DmaRequest) -> CacheResult<()> {
        let tracks = self.metadata.track_count;
        if request.arg1 >= u64::from(tracks) {
            return Err(CacheError::InvalidTrack {
                track: request.arg1,
                tracks,
            });
        }
        let track = request.arg1 as usize;
        let tracks = tracks as usize;

        let bytes = request.length.checked_mul(2).ok_or_else(|| {
            CacheError::InvalidRequest(format!("{} frames overflow", request.length))
        })?;
        let window = dma_window(target, bytes)?;

        let start = request.offset;
        let end = start
            .saturating_add(request.length)
            .min(self.metadata.sample_count);
        self.touch();
        if start >= end {
            return Ok(());
        }
        self.position.store(start, Ordering::Release);

        let chunk_frames = self.layout.chunk_frames;
        let mut staged = vec![0u8; ((end - start) * 2) as usize];
        let mut chunk_start = self.layout.chunk_of(start) * chunk_frames;
        while chunk_start < end {
            let chunk = self.get_chunk(chunk_start)?;
            for frame in start.max(chunk_start)..end.min(chunk_start + chunk_frames) {
                let sample = chunk[(frame - chunk_start) as usize * tracks + track];
                let at = ((frame - start) * 2) as usize;
                staged[at..at + 2].copy_from_slice(&sample.to_be_bytes());
            }
            chunk_start += chunk_frames;
        }

        window[..staged.len()].copy_from_slice(&staged);
        Ok(())
    }

    fn preload_tasks(&self) -> Vec<PreloadTask> {
        let first = !self.announced.swap(true, Ordering::AcqRel);
        if matches!(self.strategy, CacheStrategy::None | CacheStrategy::Default) {
            return Vec::new();
        }

        let chunks = self.chunks.read();
        if first {
            let chunk_frames = self.layout.chunk_frames;
            let warm = (0..self.initial_window()).all(|i| chunks.contains_key(&(i * chunk_frames)));
            return if warm {
                Vec::new()
            } else {
                vec![PreloadTask::new(0, PreloadPayload::InitialWindow)]
            };
        }
        if self.strategy == CacheStrategy::Preload {
            return Vec::new();
        }

        self.follow_up_offsets()
            .into_iter()
            .enumerate()
            .filter(|(_, offset)| !chunks.contains_key(offset))
            .map(|(step, offset)| {
                let priority = u32::try_from(step + 1).unwrap_or(u32::MAX);
                PreloadTask::new(priority, PreloadPayload::Chunk(offset))
            })
            .collect()
    }

    fn run_preload_task(&self, task: &PreloadTask) -> CacheResult<()> {
        self.touch();
        match task.payload {
            PreloadPayload::InitialWindow => {
                let chunks = self.initial_window();
                for i in 0..chunks {
                    self.get_chunk(i * self.layout.chunk_frames)?;
                }
                debug!(
                    "Preloaded {} leading chunks of {}",
                    chunks,
                    self.file.path().display()
                );
                if self.strategy == CacheStrategy::Preload {
                    self.decoder.close();
                }
                Ok(())
            }
            PreloadPayload::Chunk(offset) => self.get_chunk(offset).map(|_| ()),
            PreloadPayload::WholeFile => Err(CacheError::InvalidRequest(
                "samples are cached by chunk".to_string(),
            )),
        }
    }

    /// Idle samples past the TTL are closed and left alone until the next
    /// read; active ones have the chunks outside the follow window evicted.
    fn gc(&self, now: Instant) {
        let Some(last) = *self.last_access.lock() else {
            return;
        };

        if now.saturating_duration_since(last) >= self.ttl {
            if self.file.is_open() {
                debug!("Closing idle {}", self.file.path().display());
                self.decoder.close();
            }
            self.position.store(0, Ordering::Release);
            *self.last_access.lock() = None;
            return;
        }

        if self.strategy.evicts() {
            let current = self.layout.chunk_of(self.position());
            let mut chunks = self.chunks.write();
            let before = chunks.len();
            chunks.retain(|&offset, _| !self.is_evictable(current, self.layout.chunk_of(offset)));
            let evicted = before - chunks.len();
            if evicted > 0 {
                debug!(
                    "Evicted {} chunks of {} around chunk {}",
                    evicted,
                    self.file.path().display(),
                    current
                );
            }
        }
    }

    fn state(&self) -> CacheState {
        if !self.chunks.read().is_empty() {
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
