//! WAV decoding through hound

use crate::codec::CodecType;
use crate::decoder::{Decoder, clamp_frames};
use crate::error::{DecoderError, DecoderResult};
use crate::metadata::{LoopSources, Metadata};
use crate::riff;
use crate::source::SourceReader;
use hound::{SampleFormat, WavReader};
use parking_lot::Mutex;
use resound_vfs::ByteSource;
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct WavState {
    reader: Option<WavReader<SourceReader>>,
    metadata: Metadata,
    sources: LoopSources,
    scanned: bool,
    position: u64,
}

/// PCM WAV decoder. Loop points come from `smpl`, `cue ` and `LIST/adtl`.
pub struct WavDecoder {
    file: Arc<dyn ByteSource>,
    state: Mutex<WavState>,
}

impl std::fmt::Debug for WavDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavDecoder")
            .field("file", &self.file.path())
            .finish_non_exhaustive()
    }
}

impl WavDecoder {
    /// Decoder over `file`; nothing is read until it is opened.
    pub fn new(file: Arc<dyn ByteSource>) -> Self {
        Self {
            file,
            state: Mutex::new(WavState::default()),
        }
    }

    fn open_locked(&self, state: &mut WavState) -> DecoderResult<()> {
        if state.reader.is_some() {
            return Ok(());
        }

        if !state.scanned {
            let mut reader = SourceReader::new(Arc::clone(&self.file))?;
            if let Err(e) = riff::scan(&mut reader, &mut state.sources) {
                warn!("Skipping loop metadata of {}: {}", self.file.path().display(), e);
            }
            state.scanned = true;
        }

        let reader = WavReader::new(SourceReader::new(Arc::clone(&self.file))?)?;
        debug!("Opened {} ({:?})", self.file.path().display(), reader.spec());
        state.reader = Some(reader);
        state.position = 0;
        Ok(())
    }
}

fn read_samples<R: Read>(reader: &mut WavReader<R>, out: &mut [i16]) -> DecoderResult<usize> {
    let spec = reader.spec();
    let mut written = 0;

    match spec.sample_format {
        SampleFormat::Int if spec.bits_per_sample <= 16 => {
            for sample in reader.samples::<i16>().take(out.len()) {
                out[written] = sample?;
                written += 1;
            }
        }
        SampleFormat::Int => {
            let shift = spec.bits_per_sample - 16;
            for sample in reader.samples::<i32>().take(out.len()) {
                out[written] = (sample? >> shift) as i16;
                written += 1;
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>().take(out.len()) {
                out[written] = (sample?.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                written += 1;
            }
        }
    }

    Ok(written)
}

fn read_from<R: Read + Seek>(
    reader: &mut WavReader<R>,
    seek_to: Option<u64>,
    out: &mut [i16],
) -> DecoderResult<usize> {
    if let Some(frame) = seek_to {
        let target = u32::try_from(frame)
            .map_err(|_| DecoderError::Decode(format!("frame {frame} out of range")))?;
        reader.seek(target)?;
    }
    read_samples(reader, out)
}

impl Decoder for WavDecoder {
    fn codec(&self) -> CodecType {
        CodecType::Wav
    }

    fn open(&self) -> DecoderResult<()> {
        let mut state = self.state.lock();
        self.open_locked(&mut state)
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.reader = None;
        state.position = 0;
        self.file.close();
    }

    fn probe(&self) -> DecoderResult<Metadata> {
        let mut guard = self.state.lock();
        self.open_locked(&mut guard)?;
        let state = &mut *guard;

        let reader = state.reader.as_ref().ok_or(DecoderError::NotOpen)?;
        let spec = reader.spec();

        let mut metadata = Metadata {
            track_count: u32::from(spec.channels),
            sample_rate: spec.sample_rate,
            ..Metadata::default()
        };
        metadata.set_sample_count(u64::from(reader.duration()));
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
        self.open_locked(&mut guard)?;
        let state = &mut *guard;

        let reader = state.reader.as_mut().ok_or(DecoderError::NotOpen)?;
        let channels = usize::from(reader.spec().channels);
        let sample_count = match state.metadata.sample_count {
            0 => u64::from(reader.duration()),
            n => n,
        };

        let frames = clamp_frames(frames, start_frame, sample_count);
        let wanted = frames * channels;
        if buffer.len() < wanted {
            return Err(DecoderError::Decode(format!(
                "buffer holds {} samples, {} needed",
                buffer.len(),
                wanted
            )));
        }

        let seek_to = (state.position != start_frame).then_some(start_frame);
        let written = match read_from(reader, seek_to, &mut buffer[..wanted]) {
            Ok(written) => written,
            Err(e) => {
                // hound's seek is relative to its own count, which a failed
                // read leaves out of step with the stream.
                state.reader = None;
                state.position = u64::MAX;
                return Err(e);
            }
        };
        let produced = written / channels.max(1);
        state.position = start_frame + produced as u64;
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::riff::build;
    use pretty_assertions::assert_eq;
    use resound_vfs::NativeFile;

    /// Stereo 16-bit WAV where frame `i` holds `(i, -i)`.
    fn stereo_wav(frames: u32, extra: &[Vec<u8>]) -> Vec<u8> {
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&2u16.to_le_bytes());
        fmt.extend_from_slice(&22050u32.to_le_bytes());
        fmt.extend_from_slice(&(22050u32 * 4).to_le_bytes());
        fmt.extend_from_slice(&4u16.to_le_bytes());
        fmt.extend_from_slice(&16u16.to_le_bytes());

        let mut data = Vec::new();
        for i in 0..frames as i16 {
            data.extend_from_slice(&i.to_le_bytes());
            data.extend_from_slice(&(-i).to_le_bytes());
        }

        let mut body = b"WAVE".to_vec();
        body.extend_from_slice(b"fmt ");
        body.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        body.extend(fmt);
        for chunk in extra {
            body.extend_from_slice(chunk);
        }
        body.extend_from_slice(b"data");
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend(data);

        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend(body);
        out
    }

    fn decoder_for(bytes: &[u8]) -> (tempfile::TempDir, WavDecoder) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, bytes).unwrap();
        let file: Arc<dyn ByteSource> = Arc::new(NativeFile::new(&path).unwrap());
        (dir, WavDecoder::new(file))
    }

    #[test]
    fn test_probe_reads_format_and_loop() {
        let bytes = stereo_wav(
            1000,
            &[build::cue(&[(1, 100)]), build::smpl(200, 900, 0)],
        );
        let (_dir, decoder) = decoder_for(&bytes);

        let meta = decoder.probe().unwrap();
        assert_eq!(
            meta,
            Metadata {
                track_count: 2,
                sample_rate: 22050,
                sample_count: 1000,
                loop_start: 200,
                loop_end: 900,
                loop_count: -1,
            }
        );
    }

    #[test]
    fn test_probe_without_loop() {
        let (_dir, decoder) = decoder_for(&stereo_wav(64, &[]));
        let meta = decoder.probe().unwrap();
        assert_eq!((meta.loop_start, meta.loop_end, meta.loop_count), (0, 64, 0));
    }

    #[test]
    fn test_decode_ranges() {
        let (_dir, decoder) = decoder_for(&stereo_wav(1000, &[]));
        decoder.probe().unwrap();

        let mut buf = vec![0i16; 20];
        assert_eq!(decoder.decode(&mut buf, 10, 500).unwrap(), 10);
        assert_eq!(buf[0], 500);
        assert_eq!(buf[1], -500);
        assert_eq!(buf[18], 509);

        // Sequential read continues without seeking.
        assert_eq!(decoder.decode(&mut buf, 10, 510).unwrap(), 10);
        assert_eq!(buf[0], 510);

        // Backwards seek.
        assert_eq!(decoder.decode(&mut buf, 10, 0).unwrap(), 10);
        assert_eq!(&buf[..4], &[0, 0, 1, -1]);
    }

    #[test]
    fn test_decode_clamps_at_end() {
        let (_dir, decoder) = decoder_for(&stereo_wav(100, &[]));
        decoder.probe().unwrap();

        let mut buf = vec![0i16; 64];
        assert_eq!(decoder.decode(&mut buf, 32, 90).unwrap(), 10);
        assert_eq!(buf[18], 99);
        assert_eq!(decoder.decode(&mut buf, 32, 100).unwrap(), 0);
    }

    #[test]
    fn test_reopen_after_close() {
        let (_dir, decoder) = decoder_for(&stereo_wav(100, &[build::smpl(10, 20, 1)]));
        let first = decoder.probe().unwrap();
        decoder.close();

        let mut buf = vec![0i16; 2];
        assert_eq!(decoder.decode(&mut buf, 1, 42).unwrap(), 1);
        assert_eq!(buf, vec![42, -42]);
        assert_eq!(decoder.probe().unwrap(), first);
    }

    #[test]
    fn test_failed_read_forces_seek() {
        let mut bytes = stereo_wav(1000, &[]);
        // Keep the header's frame count but cut the data after frame 499.
        bytes.truncate(bytes.len() - 500 * 4);
        let (_dir, decoder) = decoder_for(&bytes);
        assert_eq!(decoder.probe().unwrap().sample_count, 1000);

        let mut buf = vec![0i16; 200];
        assert!(decoder.decode(&mut buf, 100, 450).is_err());

        assert_eq!(decoder.decode(&mut buf, 10, 450).unwrap(), 10);
        assert_eq!(&buf[..4], &[450, -450, 451, -451]);
    }

    #[test]
    fn test_stream_ending_early_is_short_decode() {
        let (_dir, decoder) = decoder_for(&stereo_wav(1000, &[]));
        let mut meta = decoder.probe().unwrap();
        meta.sample_count = 1200;
        decoder.set_metadata(meta);

        let mut buf = vec![0i16; 200];
        assert!(matches!(
            decoder.decode(&mut buf, 100, 950),
            Err(DecoderError::ShortDecode {
                offset: 950,
                requested: 100,
                produced: 50
            })
        ));

        // The position still tracks the frames actually read.
        assert_eq!(decoder.decode(&mut buf, 10, 100).unwrap(), 10);
        assert_eq!(buf[0], 100);
    }
}
