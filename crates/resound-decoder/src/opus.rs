//! Opus packet decoding through libopus
//!
//! symphonia demuxes Ogg Opus but ships no Opus codec, so packets from its
//! Ogg reader are handed to `audiopus` here.

use crate::error::{DecoderError, DecoderResult};
use audiopus::coder::Decoder as OpusDecoder;
use audiopus::{Channels, SampleRate};
use tracing::warn;

/// Longest Opus packet, 120 ms at 48 kHz
const MAX_PACKET_FRAMES: usize = 5760;

/// Stateful decoder for the packets of one Opus stream.
pub struct OpusPackets {
    decoder: OpusDecoder,
    channels: usize,
    scratch: Vec<i16>,
}

impl std::fmt::Debug for OpusPackets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpusPackets")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl OpusPackets {
    /// Decoder for a mono or stereo stream.
    pub fn new(channels: usize) -> DecoderResult<Self> {
        let layout = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            n => {
                return Err(DecoderError::UnsupportedCodec(format!(
                    "Opus with {n} channels"
                )));
            }
        };
        let decoder = OpusDecoder::new(SampleRate::Hz48000, layout)
            .map_err(|e| DecoderError::Decode(format!("opus decoder: {e}")))?;

        Ok(Self {
            decoder,
            channels,
            scratch: vec![0; MAX_PACKET_FRAMES * channels],
        })
    }

    /// Decode one packet to interleaved samples. Corrupt packets yield `None`.
    pub fn decode(&mut self, packet: &[u8]) -> Option<Vec<i16>> {
        match self.decoder.decode(Some(packet), &mut self.scratch, false) {
            Ok(frames) => Some(self.scratch[..frames * self.channels].to_vec()),
            Err(e) => {
                warn!("Skipping corrupt Opus packet: {}", e);
                None
            }
        }
    }
}
