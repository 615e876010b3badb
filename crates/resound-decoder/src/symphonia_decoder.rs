//! FLAC, Vorbis, MP3, AIFF and Opus streams through symphonia
//!
//! Opus packets come out of symphonia's Ogg reader and are decoded by
//! libopus when the `opus` feature is enabled.

use crate::codec::CodecType;
use crate::decoder::{Decoder, clamp_frames};
use crate::error::{DecoderError, DecoderResult};
use crate::metadata::{LoopSources, Metadata};
use crate::riff;
use crate::source::SourceReader;
use parking_lot::Mutex;
use resound_vfs::ByteSource;
use std::collections::VecDeque;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    self, CODEC_TYPE_NULL, CODEC_TYPE_OPUS, CodecParameters, DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Opus always decodes at 48 kHz regardless of the input rate in its header
const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Application block id of RIFF chunks embedded in FLAC
const FLAC_RIFF_APPLICATION: &str = "riff";

enum PacketDecoder {
    Symphonia(Box<dyn codecs::Decoder>),
    #[cfg(feature = "opus")]
    Opus(crate::opus::OpusPackets),
}

impl PacketDecoder {
    /// Interleaved samples of one packet, `None` when the packet is corrupt.
    fn decode(&mut self, packet: &Packet) -> DecoderResult<Option<Vec<i16>>> {
        match self {
            Self::Symphonia(decoder) => match decoder.decode(packet) {
                Ok(decoded) => {
                    let mut samples =
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
                    samples.copy_interleaved_ref(decoded);
                    Ok(Some(samples.samples().to_vec()))
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("Skipping corrupt packet at {}: {}", packet.ts(), reason);
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            },
            #[cfg(feature = "opus")]
            Self::Opus(decoder) => Ok(decoder.decode(packet.buf())),
        }
    }
}

struct Stream {
    format: Box<dyn FormatReader>,
    decoder: Option<PacketDecoder>,
    params: CodecParameters,
    track_id: u32,
    channels: usize,
    /// Container timestamp of frame 0; the Opus pre-skip
    ts_offset: u64,
    /// Next frame `decode` will hand out
    position: u64,
    /// Interleaved samples decoded past the last request
    pending: VecDeque<i16>,
    /// Frames before this container timestamp are discarded
    skip_until: Option<u64>,
}

#[derive(Default)]
struct State {
    stream: Option<Stream>,
    metadata: Metadata,
    sources: LoopSources,
    tags_read: bool,
}

/// Decoder backed by symphonia's demuxers and codecs.
pub struct SymphoniaDecoder {
    file: Arc<dyn ByteSource>,
    codec: CodecType,
    state: Mutex<State>,
}

impl std::fmt::Debug for SymphoniaDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymphoniaDecoder")
            .field("file", &self.file.path())
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

fn collect_revision(revision: &MetadataRevision, sources: &mut LoopSources) {
    for tag in revision.tags() {
        sources.add_comment(&tag.key, &tag.value.to_string());
    }
    for vendor in revision.vendor_data() {
        if vendor.ident.eq_ignore_ascii_case(FLAC_RIFF_APPLICATION) {
            riff::parse_chunks(&vendor.data, sources);
        }
    }
}

fn is_end_of_stream(error: &SymphoniaError) -> bool {
    matches!(error, SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}

impl SymphoniaDecoder {
    /// Decoder for `codec` over `file`; nothing is read until it is opened.
    pub fn new(file: Arc<dyn ByteSource>, codec: CodecType) -> Self {
        Self {
            file,
            codec,
            state: Mutex::new(State::default()),
        }
    }

    fn hint(&self) -> Hint {
        let mut hint = Hint::new();
        match self.codec {
            CodecType::Flac => {
                if let Some(ext) = self.file.extension() {
                    hint.with_extension(&ext);
                } else {
                    hint.with_extension("flac");
                }
            }
            CodecType::Vorbis | CodecType::Opus => {
                hint.with_extension("ogg");
            }
            CodecType::Mp3 => {
                hint.with_extension("mp3");
            }
            CodecType::Aiff => {
                hint.with_extension("aiff");
            }
            CodecType::Auto | CodecType::Wav => {}
        }
        hint
    }

    fn open_locked(&self, state: &mut State) -> DecoderResult<()> {
        if state.stream.is_some() {
            return Ok(());
        }

        let source = SourceReader::new(Arc::clone(&self.file))?;
        let mss = MediaSourceStream::new(Box::new(source), Default::default());
        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let mut probed = symphonia::default::get_probe().format(
            &self.hint(),
            mss,
            &format_opts,
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecoderError::UnknownFormat("no audio track".to_string()))?;
        let params = track.codec_params.clone();
        let track_id = track.id;
        let channels = params
            .channels
            .map(|channels| channels.count())
            .ok_or_else(|| DecoderError::Decode("stream has no channel layout".to_string()))?;
        let ts_offset = if params.codec == CODEC_TYPE_OPUS {
            params.delay.map_or(0, u64::from)
        } else {
            0
        };

        if !state.tags_read {
            if let Some(metadata) = probed.metadata.get()
                && let Some(revision) = metadata.current()
            {
                collect_revision(revision, &mut state.sources);
            }
            if let Some(revision) = format.metadata().current() {
                collect_revision(revision, &mut state.sources);
            }
            state.tags_read = true;
        }

        debug!(
            "Opened {} as {} ({} channels)",
            self.file.path().display(),
            self.codec,
            channels
        );

        state.stream = Some(Stream {
            format,
            decoder: None,
            params,
            track_id,
            channels,
            ts_offset,
            position: 0,
            pending: VecDeque::new(),
            skip_until: (ts_offset > 0).then_some(ts_offset),
        });
        Ok(())
    }

    fn reopen_locked(&self, state: &mut State) -> DecoderResult<()> {
        state.stream = None;
        self.open_locked(state)
    }
}

impl Stream {
    fn make_decoder(&self) -> DecoderResult<PacketDecoder> {
        #[cfg(feature = "opus")]
        if self.params.codec == CODEC_TYPE_OPUS {
            return crate::opus::OpusPackets::new(self.channels).map(PacketDecoder::Opus);
        }

        symphonia::default::get_codecs()
            .make(&self.params, &DecoderOptions::default())
            .map(PacketDecoder::Symphonia)
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => {
                    DecoderError::UnsupportedCodec(what.to_string())
                }
                other => other.into(),
            })
    }

    fn decoder(&mut self) -> DecoderResult<&mut PacketDecoder> {
        if self.decoder.is_none() {
            self.decoder = Some(self.make_decoder()?);
        }
        self.decoder.as_mut().ok_or(DecoderError::NotOpen)
    }

    /// Frames in the stream, excluding the Opus pre-skip.
    fn frame_count(&mut self) -> DecoderResult<u64> {
        let frames = match self.params.n_frames {
            Some(frames) => frames,
            None => self.count_frames()?,
        };
        Ok(frames.saturating_sub(self.ts_offset))
    }

    /// Sum packet durations to count frames when the container does not say.
    fn count_frames(&mut self) -> DecoderResult<u64> {
        let mut frames = 0u64;
        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => frames += packet.dur(),
                Ok(_) => {}
                Err(e) if is_end_of_stream(&e) => return Ok(frames),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decode the next packet into `pending`. Returns false at end of stream.
    fn fill(&mut self) -> DecoderResult<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(e) if is_end_of_stream(&e) => return Ok(false),
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder = None;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let ts = packet.ts();
            let Some(samples) = self.decoder()?.decode(&packet)? else {
                continue;
            };
            let frames = (samples.len() / self.channels.max(1)) as u64;

            let mut skip = 0usize;
            if let Some(target) = self.skip_until {
                if ts + frames <= target {
                    continue;
                }
                skip = usize::try_from(target.saturating_sub(ts)).unwrap_or(usize::MAX);
                self.skip_until = None;
            }

            let start = (skip * self.channels).min(samples.len());
            self.pending.extend(&samples[start..]);
            return Ok(true);
        }
    }

    /// Copy decoded samples into `out` until it is full or the stream ends.
    fn read_into(&mut self, out: &mut [i16]) -> DecoderResult<usize> {
        let mut written = 0;
        while written < out.len() {
            if self.pending.is_empty() && !self.fill()? {
                break;
            }
            let take = (out.len() - written).min(self.pending.len());
            for (slot, sample) in out[written..written + take]
                .iter_mut()
                .zip(self.pending.drain(..take))
            {
                *slot = sample;
            }
            written += take;
        }
        Ok(written)
    }

    fn seek(&mut self, frame: u64) -> DecoderResult<()> {
        let ts = frame + self.ts_offset;
        self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts,
                track_id: self.track_id,
            },
        )?;
        match &mut self.decoder {
            Some(PacketDecoder::Symphonia(decoder)) => decoder.reset(),
            other => *other = None,
        }
        self.pending.clear();
        self.skip_until = Some(ts);
        self.position = frame;
        Ok(())
    }
}

impl Decoder for SymphoniaDecoder {
    fn codec(&self) -> CodecType {
        self.codec
    }

    fn open(&self) -> DecoderResult<()> {
        let mut state = self.state.lock();
        self.open_locked(&mut state)
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.stream = None;
        self.file.close();
    }

    fn probe(&self) -> DecoderResult<Metadata> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.open_locked(state)?;

        let stream = state.stream.as_mut().ok_or(DecoderError::NotOpen)?;
        let sample_rate = if self.codec == CodecType::Opus {
            OPUS_SAMPLE_RATE
        } else {
            stream
                .params
                .sample_rate
                .ok_or_else(|| DecoderError::Decode("stream has no sample rate".to_string()))?
        };
        let channels = stream.channels;

        let counted = stream.params.n_frames.is_none();
        if counted {
            debug!("Counting frames of {}", self.file.path().display());
        }
        let sample_count = stream.frame_count()?;
        if counted {
            self.reopen_locked(state)?;
        }

        let mut metadata = Metadata {
            track_count: u32::try_from(channels).unwrap_or(u32::MAX),
            sample_rate,
            ..Metadata::default()
        };
        metadata.set_sample_count(sample_count);
        state.sources.resolve(&mut metadata);

        state.metadata = metadata;
        Ok(metadata)
    }

    fn metadata(&self) -> Metadata {
        self.state.lock().metadata
    }

    fn set_metadata(&self, metadata: Metadata) {
        self.state.lock().metadata = metadata;
    }

    fn decode(&self, buffer: &mut [i16], frames: usize, start_frame: u64) -> DecoderResult<usize> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.open_locked(state)?;

        let sample_count = state.metadata.sample_count;
        let stream = state.stream.as_mut().ok_or(DecoderError::NotOpen)?;
        let channels = stream.channels;

        let frames = clamp_frames(frames, start_frame, sample_count);
        let wanted = frames * channels;
        if buffer.len() < wanted {
            return Err(DecoderError::Decode(format!(
                "buffer holds {} samples, {} needed",
                buffer.len(),
                wanted
            )));
        }

        if stream.position != start_frame {
            if let Err(e) = stream.seek(start_frame) {
                debug!("Seek to {} failed ({}), decoding from the start", start_frame, e);
                self.reopen_locked(state)?;
                let stream = state.stream.as_mut().ok_or(DecoderError::NotOpen)?;
                stream.skip_until = Some(start_frame + stream.ts_offset);
                stream.position = start_frame;
            }
        }
        let stream = state.stream.as_mut().ok_or(DecoderError::NotOpen)?;

        let written = match stream.read_into(&mut buffer[..wanted]) {
            Ok(written) => written,
            Err(e) => {
                stream.pending.clear();
                stream.position = u64::MAX;
                return Err(e);
            }
        };

        let produced = written / channels.max(1);
        stream.position = start_frame + produced as u64;
        if produced < frames {
            return Err(DecoderError::ShortDecode {
                offset: start_frame,
                requested: frames,
                produced,
            });
        }
        Ok(produced)
    }
}
