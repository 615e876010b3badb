//! Audio probing and decoding for the resource cache.
//!
//! A [`Decoder`] wraps one [`ByteSource`](resound_vfs::ByteSource) and
//! answers two questions: what the stream looks like ([`Metadata`], including
//! loop points) and what the interleaved 16-bit frames in a given range are.
//!
//! WAV goes through `hound` with a separate RIFF walk for cue, label and
//! sampler chunks. FLAC, Ogg Vorbis, MP3 and AIFF go through `symphonia`.
//! Ogg Opus is demuxed by `symphonia` and decoded by libopus with the `opus`
//! feature; without it Opus streams can be probed but not decoded.
//!
//! Loop points are collected from every source a format offers and resolved
//! by [`LoopSources::resolve`] with a fixed precedence.

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

pub mod codec;
pub mod decoder;
pub mod error;
pub mod metadata;
pub mod ogg;
#[cfg(feature = "opus")]
pub mod opus;
pub mod riff;
pub mod source;
pub mod symphonia_decoder;
pub mod wav;

pub use codec::{CodecType, resolve_codec};
pub use decoder::{Decoder, open_decoder};
pub use error::{DecoderError, DecoderResult};
pub use metadata::{LabelKind, LoopRegion, LoopSources, Metadata};
pub use source::SourceReader;
pub use symphonia_decoder::SymphoniaDecoder;
pub use wav::WavDecoder;
