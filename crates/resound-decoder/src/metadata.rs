//! Stream metadata and loop point resolution

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Loop count reported for loops that repeat forever
pub const LOOP_INFINITE: i32 = -1;

/// Properties of one audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Interleaved channels per frame
    pub track_count: u32,
    /// Frames per second
    pub sample_rate: u32,
    /// Total frames
    pub sample_count: u64,
    /// First frame of the loop region
    pub loop_start: u64,
    /// Frame where playback wraps to `loop_start`
    pub loop_end: u64,
    /// -1 infinite, 0 no loop, N finite repeat count
    pub loop_count: i32,
}

impl Metadata {
    /// Set the frame count; an unset loop end follows it.
    pub fn set_sample_count(&mut self, sample_count: u64) {
        self.sample_count = sample_count;
        if self.loop_end == 0 {
            self.loop_end = sample_count;
        }
    }

    /// Set the loop region. `end` is ignored unless it lies after `start`.
    pub fn set_loop(&mut self, start: u64, end: u64, count: i32) {
        self.loop_start = start;
        self.loop_end = if end > start { end } else { self.sample_count };
        self.loop_count = count;
    }

    /// Disable looping.
    pub fn clear_loop(&mut self) {
        self.loop_start = 0;
        self.loop_end = self.sample_count;
        self.loop_count = 0;
    }

    /// Whether the caller supplied enough to skip probing.
    pub fn is_known(&self) -> bool {
        self.track_count != 0 && self.sample_count != 0
    }
}

/// Meaning of a cue label or comment key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// A whole loop region (offset plus length)
    Loop,
    /// Loop start frame
    Start,
    /// Loop end frame
    End,
    /// Loop length in frames
    Length,
    /// JSON object with `start` and `end`
    Points,
}

impl LabelKind {
    /// Classify a key, ignoring case, punctuation and an ID3 frame prefix
    /// such as `TXXX:`.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.rsplit(':').next().unwrap_or(key);
        let normalized: String = key
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "LOOP" | "CYCLE" | "CYCLES" => Some(Self::Loop),
            "LOOPSTART" | "LOOPBEGIN" | "LOOPPOINT" => Some(Self::Start),
            "LOOPEND" => Some(Self::End),
            "LOOPLENGTH" => Some(Self::Length),
            "LOOPPOINTS" => Some(Self::Points),
            _ => None,
        }
    }
}

/// A loop region from a dedicated sampler chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    /// First frame
    pub start: u64,
    /// Last frame
    pub end: u64,
    /// Repeat count, 0 meaning forever
    pub play_count: u32,
}

#[derive(Debug, Deserialize)]
struct LoopPointsValue {
    start: u64,
    end: u64,
}

/// Loop evidence gathered from a stream's tags and chunks.
///
/// Sources are recorded as they are found and only resolved into
/// [`Metadata`] once the frame count is known, so the result does not
/// depend on the order chunks appear in the file.
#[derive(Debug, Clone, Default)]
pub struct LoopSources {
    loop_chunk: Option<LoopRegion>,
    cue_offsets: BTreeMap<u32, u64>,
    cue_labels: BTreeMap<u32, LabelKind>,
    cue_lengths: BTreeMap<u32, u64>,
    comments: HashMap<LabelKind, u64>,
    comment_points: Option<(u64, u64)>,
}

impl LoopSources {
    /// Record a sampler-chunk loop. Only the first one counts.
    pub fn set_loop_chunk(&mut self, region: LoopRegion) {
        self.loop_chunk.get_or_insert(region);
    }

    /// Record a cue point position.
    pub fn add_cue_point(&mut self, id: u32, offset: u64) {
        self.cue_offsets.insert(id, offset);
    }

    /// Record a cue label; labels without loop meaning are dropped.
    pub fn set_cue_label(&mut self, id: u32, label: &str) {
        if let Some(kind) = LabelKind::parse(label) {
            self.cue_labels.insert(id, kind);
        }
    }

    /// Record the length of a labelled cue region.
    pub fn set_cue_length(&mut self, id: u32, length: u64) {
        self.cue_lengths.insert(id, length);
    }

    /// Record a `key=value` style tag.
    pub fn add_comment(&mut self, key: &str, value: &str) {
        let Some(kind) = LabelKind::parse(key) else {
            return;
        };
        let value = value.trim_start_matches('\u{feff}').trim();

        if kind == LabelKind::Points {
            match serde_json::from_str::<LoopPointsValue>(value) {
                Ok(points) => self.comment_points = Some((points.start, points.end)),
                Err(e) => debug!("Ignoring malformed loop points '{}': {}", value, e),
            }
            return;
        }

        match value.parse::<u64>() {
            Ok(frame) => {
                self.comments.entry(kind).or_insert(frame);
            }
            Err(_) => debug!("Ignoring non-numeric {:?} tag '{}'", kind, value),
        }
    }

    /// Record a raw `KEY=value` comment line.
    pub fn add_comment_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            self.add_comment(key, value);
        }
    }

    /// Whether nothing loop-related was found.
    pub fn is_empty(&self) -> bool {
        self.loop_chunk.is_none()
            && self.cue_labels.is_empty()
            && self.comments.is_empty()
            && self.comment_points.is_none()
    }

    fn labelled_cue(&self, kind: LabelKind) -> Option<(u32, u64)> {
        self.cue_labels
            .iter()
            .filter(|(_, label)| **label == kind)
            .find_map(|(id, _)| self.cue_offsets.get(id).map(|offset| (*id, *offset)))
    }

    /// Apply the strongest loop source to `metadata`.
    ///
    /// Order: sampler chunk, a cue labelled as a loop region with a length,
    /// loop start/end cues, start+end or start+length comments, then a
    /// `LOOPPOINTS` JSON comment. With none of these the loop is cleared.
    ///
    /// A start cue alone is enough: without an end cue the loop runs to the
    /// last frame. A start comment alone is not.
    pub fn resolve(&self, metadata: &mut Metadata) {
        if let Some(region) = self.loop_chunk {
            let count = if region.play_count == 0 {
                LOOP_INFINITE
            } else {
                i32::try_from(region.play_count).unwrap_or(i32::MAX)
            };
            metadata.set_loop(region.start, region.end, count);
            return;
        }

        if let Some((id, offset)) = self.labelled_cue(LabelKind::Loop)
            && let Some(&length) = self.cue_lengths.get(&id)
            && length > 0
        {
            metadata.set_loop(offset, offset + length, LOOP_INFINITE);
            return;
        }

        if let Some((_, start)) = self.labelled_cue(LabelKind::Start) {
            let end = self
                .labelled_cue(LabelKind::End)
                .map_or(metadata.sample_count, |(_, end)| end);
            metadata.set_loop(start, end, LOOP_INFINITE);
            return;
        }

        if let Some(&start) = self.comments.get(&LabelKind::Start) {
            let end = self.comments.get(&LabelKind::End).copied().or_else(|| {
                self.comments
                    .get(&LabelKind::Length)
                    .map(|length| start + length)
            });
            if let Some(end) = end {
                metadata.set_loop(start, end, LOOP_INFINITE);
                return;
            }
        }

        if let Some((start, end)) = self.comment_points {
            metadata.set_loop(start, end, LOOP_INFINITE);
            return;
        }

        metadata.clear_loop();
    }
}
