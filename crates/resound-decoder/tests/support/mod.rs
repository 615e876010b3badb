//! WAV, FLAC, MP3 and Ogg fixture builders

#![allow(dead_code, clippy::unwrap_used)]

use resound_vfs::{ByteSource, NativeFile, VfsResult};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Value of channel `channel` at frame `frame`.
pub fn sample_at(frame: u32, channel: u16) -> i16 {
    let base = (frame % 30_000) as i16;
    if channel == 0 { base } else { -base }
}

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// `smpl` chunk with a single loop.
pub fn smpl(start: u32, end: u32, play_count: u32) -> Vec<u8> {
    let mut body = vec![0u8; 60];
    body[28..32].copy_from_slice(&1u32.to_le_bytes());
    body[44..48].copy_from_slice(&start.to_le_bytes());
    body[48..52].copy_from_slice(&end.to_le_bytes());
    body[56..60].copy_from_slice(&play_count.to_le_bytes());
    chunk(b"smpl", &body)
}

/// `LIST/INFO` chunk holding free-form comments.
pub fn info_comments(lines: &[&str]) -> Vec<u8> {
    let mut body = b"INFO".to_vec();
    for line in lines {
        let mut value = line.as_bytes().to_vec();
        value.push(0);
        body.extend(chunk(b"ICMT", &value));
    }
    chunk(b"LIST", &body)
}

/// 16-bit PCM WAV following [`sample_at`], with extra chunks before `data`.
pub fn wav(frames: u32, channels: u16, sample_rate: u32, extra: &[Vec<u8>]) -> Vec<u8> {
    let block_align = channels * 2;
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());

    let mut data = Vec::with_capacity(frames as usize * usize::from(block_align));
    for frame in 0..frames {
        for channel in 0..channels {
            data.extend_from_slice(&sample_at(frame, channel).to_le_bytes());
        }
    }

    let mut body = b"WAVE".to_vec();
    body.extend(chunk(b"fmt ", &fmt));
    for extra in extra {
        body.extend_from_slice(extra);
    }
    body.extend(chunk(b"data", &data));

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 == 0 { crc << 1 } else { (crc << 1) ^ 0x07 };
        }
    }
    crc
}

fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 == 0 { crc << 1 } else { (crc << 1) ^ 0x8005 };
        }
    }
    crc
}

fn flac_block(kind: u8, last: bool, body: &[u8]) -> Vec<u8> {
    let mut out = vec![if last { 0x80 | kind } else { kind }];
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// Vorbis comment list as stored in FLAC and Ogg headers.
pub fn vorbis_comments(comments: &[&str]) -> Vec<u8> {
    let vendor = b"resound fixtures";
    let mut out = (vendor.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(vendor);
    out.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        out.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        out.extend_from_slice(comment.as_bytes());
    }
    out
}

/// 16-bit FLAC following [`sample_at`], stored in verbatim subframes.
pub fn flac(frames: u32, channels: u16, sample_rate: u32, comments: &[&str]) -> Vec<u8> {
    const BLOCK: u32 = 1024;

    let mut info = Vec::with_capacity(34);
    info.extend_from_slice(&(BLOCK as u16).to_be_bytes());
    info.extend_from_slice(&(BLOCK as u16).to_be_bytes());
    info.extend_from_slice(&[0; 6]);
    let packed = (u64::from(sample_rate) << 44)
        | (u64::from(channels - 1) << 41)
        | (15u64 << 36)
        | u64::from(frames);
    info.extend_from_slice(&packed.to_be_bytes());
    info.extend_from_slice(&[0; 16]);

    let mut out = b"fLaC".to_vec();
    out.extend(flac_block(0, false, &info));
    out.extend(flac_block(4, true, &vorbis_comments(comments)));

    for (number, first) in (0..frames).step_by(BLOCK as usize).enumerate() {
        let len = BLOCK.min(frames - first);
        let mut frame = vec![
            0xFF,
            0xF8,
            0x70,
            (((channels - 1) as u8) << 4) | 0x08,
            number as u8,
        ];
        frame.extend_from_slice(&((len - 1) as u16).to_be_bytes());
        frame.push(crc8(&frame));
        for channel in 0..channels {
            frame.push(0x02);
            for i in first..first + len {
                frame.extend_from_slice(&sample_at(i, channel).to_be_bytes());
            }
        }
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        out.extend(frame);
    }
    out
}

/// Mono 48 kHz MPEG-1 layer III file of silent 128 kbit/s frames, each
/// 1152 samples long, behind an ID3v2.3 tag of `TXXX` frames.
pub fn silent_mp3(mpeg_frames: usize, txxx: &[(&str, &str)]) -> Vec<u8> {
    const FRAME_LEN: usize = 384;

    let mut frames = Vec::new();
    for (description, value) in txxx {
        let mut body = vec![0u8];
        body.extend_from_slice(description.as_bytes());
        body.push(0);
        body.extend_from_slice(value.as_bytes());
        frames.extend_from_slice(b"TXXX");
        frames.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frames.extend_from_slice(&[0, 0]);
        frames.extend(body);
    }

    let size = frames.len() as u32;
    let mut out = b"ID3\x03\x00\x00".to_vec();
    out.extend_from_slice(&[
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    out.extend(frames);

    for _ in 0..mpeg_frames {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x94, 0xC0]);
        out.extend(frame);
    }
    out
}

/// Byte source that counts position jumps on the wrapped source.
#[derive(Debug)]
pub struct JumpCounter {
    inner: Arc<dyn ByteSource>,
    jumps: AtomicUsize,
}

impl JumpCounter {
    pub fn new(inner: Arc<dyn ByteSource>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            jumps: AtomicUsize::new(0),
        })
    }

    /// Jumps since the last call.
    pub fn take(&self) -> usize {
        self.jumps.swap(0, Ordering::SeqCst)
    }
}

impl ByteSource for JumpCounter {
    fn open(&self) -> VfsResult<()> {
        self.inner.open()
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read(buf)
    }

    fn seek(&self, pos: SeekFrom) -> VfsResult<u64> {
        let before = self.inner.tell();
        let after = self.inner.seek(pos)?;
        if after != before {
            self.jumps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(after)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Write `bytes` to `dir/name` and open it as a byte source.
pub fn source(dir: &Path, name: &str, bytes: &[u8]) -> Arc<dyn ByteSource> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    Arc::new(NativeFile::new(path).unwrap())
}

/// Ogg Opus fixtures, encoded with libopus.
#[cfg(feature = "opus")]
pub mod ogg_opus {
    use super::vorbis_comments;
    use audiopus::coder::Encoder;
    use audiopus::{Application, Channels, SampleRate};

    /// Frames per Opus packet, 20 ms at 48 kHz
    pub const PACKET_FRAMES: usize = 960;

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0u32;
        for &byte in bytes {
            crc ^= u32::from(byte) << 24;
            for _ in 0..8 {
                crc = if crc & 0x8000_0000 == 0 {
                    crc << 1
                } else {
                    (crc << 1) ^ 0x04C1_1DB7
                };
            }
        }
        crc
    }

    fn page(header_type: u8, granule: u64, sequence: u32, packet: &[u8]) -> Vec<u8> {
        let mut lacing = vec![255u8; packet.len() / 255];
        lacing.push((packet.len() % 255) as u8);

        let mut out = b"OggS".to_vec();
        out.push(0);
        out.push(header_type);
        out.extend_from_slice(&granule.to_le_bytes());
        out.extend_from_slice(&0x5EED_u32.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.push(lacing.len() as u8);
        out.extend(lacing);
        out.extend_from_slice(packet);

        let crc = crc32(&out);
        out[22..26].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Mono 440 Hz tone of `frames` frames after `pre_skip` frames of lead-in.
    pub fn tone(frames: usize, pre_skip: u16, comments: &[&str]) -> Vec<u8> {
        let total = usize::from(pre_skip) + frames;
        let packets = total.div_ceil(PACKET_FRAMES);
        let pcm: Vec<i16> = (0..packets * PACKET_FRAMES)
            .map(|i| {
                let t = i as f32 / 48_000.0;
                (8000.0 * (t * 440.0 * std::f32::consts::TAU).sin()) as i16
            })
            .collect();

        let mut head = b"OpusHead".to_vec();
        head.push(1);
        head.push(1);
        head.extend_from_slice(&pre_skip.to_le_bytes());
        head.extend_from_slice(&48_000u32.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);

        let mut tags = b"OpusTags".to_vec();
        tags.extend(vorbis_comments(comments));

        let mut out = page(0x02, 0, 0, &head);
        out.extend(page(0x00, 0, 1, &tags));

        let mut encoder =
            Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Audio).unwrap();
        let mut packet = vec![0u8; 4000];
        for (i, input) in pcm.chunks(PACKET_FRAMES).enumerate() {
            let len = encoder.encode(input, &mut packet).unwrap();
            let last = i + 1 == packets;
            let granule = if last {
                total
            } else {
                (i + 1) * PACKET_FRAMES
            };
            out.extend(page(
                if last { 0x04 } else { 0x00 },
                granule as u64,
                i as u32 + 2,
                &packet[..len],
            ));
        }
        out
    }
}
