//! Decoder interface and factory

use crate::codec::{CodecType, resolve_codec};
use crate::error::DecoderResult;
use crate::metadata::Metadata;
use crate::symphonia_decoder::SymphoniaDecoder;
use crate::wav::WavDecoder;
use resound_vfs::ByteSource;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Frame-range decoding over one byte source.
///
/// Implementations serialize all state behind an internal lock, so a decoder
/// can be shared between the scheduler and callers.
pub trait Decoder: Send + Sync + fmt::Debug {
    /// Codec this decoder handles.
    fn codec(&self) -> CodecType;

    /// Open the source and prepare to decode. No-op if already open.
    ///
    /// The first open also collects tag and chunk metadata for loop points.
    fn open(&self) -> DecoderResult<()>;

    /// Release the source and forget the decode position.
    fn close(&self);

    /// Read stream properties and loop points, opening if needed.
    fn probe(&self) -> DecoderResult<Metadata>;

    /// Last probed or supplied metadata.
    fn metadata(&self) -> Metadata;

    /// Trust caller-supplied metadata instead of probing.
    fn set_metadata(&self, metadata: Metadata);

    /// Decode up to `frames` frames starting at `start_frame` into `buffer`
    /// as interleaved samples.
    ///
    /// The request is clamped to the stream's frame count. Returns the number
    /// of frames written. A stream that ends before the clamped request is
    /// filled yields [`DecoderError::ShortDecode`](crate::DecoderError::ShortDecode)
    /// and a failed read leaves the decoder ready to seek on the next call.
    fn decode(&self, buffer: &mut [i16], frames: usize, start_frame: u64) -> DecoderResult<usize>;
}

/// Build the decoder for `file`, resolving `hint` if it is `Auto`.
pub fn open_decoder(file: Arc<dyn ByteSource>, hint: CodecType) -> DecoderResult<Box<dyn Decoder>> {
    let codec = resolve_codec(&file, hint)?;
    debug!("Using {} decoder for {}", codec, file.path().display());

    Ok(match codec {
        CodecType::Wav => Box::new(WavDecoder::new(file)),
        other => Box::new(SymphoniaDecoder::new(file, other)),
    })
}

/// Number of frames a request may produce, given where the stream ends.
pub(crate) fn clamp_frames(frames: usize, start_frame: u64, sample_count: u64) -> usize {
    let remaining = sample_count.saturating_sub(start_frame);
    usize::try_from(remaining).map_or(frames, |remaining| frames.min(remaining))
}
