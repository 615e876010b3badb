//! RIFF chunks carrying loop information
//!
//! ```text
//! "cue "  u32 count, then count x 24-byte points
//!         point: +0 id, +20 sample offset
//! "LIST"  "adtl" followed by sub-chunks
//!         "labl": u32 cue id, NUL-terminated text
//!         "ltxt": u32 cue id, u32 sample length, ...
//! "LIST"  "INFO" followed by sub-chunks
//!         "ICMT": free-form KEY=value comment text
//! "smpl"  +28 u32 loop count, loops from +36, 24 bytes each
//!         loop: +8 start, +12 end, +20 play count
//! ```
//!
//! All fields are little-endian and chunk bodies are padded to even length.

use crate::error::{DecoderError, DecoderResult};
use crate::metadata::{LoopRegion, LoopSources};
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// Largest chunk body read into memory while scanning
const MAX_METADATA_CHUNK: u32 = 1024 * 1024;

fn u32_at(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Walk a RIFF/WAVE stream and record every loop source found.
///
/// The reader is left at an unspecified position.
pub fn scan<R: Read + Seek>(reader: &mut R, sources: &mut LoopSources) -> DecoderResult<()> {
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; 12];
    reader.read_exact(&mut header)?;
    if &header[..4] != b"RIFF" || &header[8..] != b"WAVE" {
        return Err(DecoderError::UnknownFormat("missing RIFF/WAVE header".to_string()));
    }

    loop {
        let mut chunk = [0u8; 8];
        match reader.read_exact(&mut chunk) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let id = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        let padded = u64::from(size) + u64::from(size & 1);

        if matches!(&id, b"cue " | b"LIST" | b"smpl") && size <= MAX_METADATA_CHUNK {
            let mut body = vec![0u8; size as usize];
            if reader.read_exact(&mut body).is_err() {
                debug!("Truncated {:?} chunk", String::from_utf8_lossy(&id));
                break;
            }
            parse_chunk(&id, &body, sources);
            if size & 1 == 1 {
                reader.seek(SeekFrom::Current(1))?;
            }
        } else {
            reader.seek(SeekFrom::Current(i64::try_from(padded).unwrap_or(i64::MAX)))?;
        }
    }

    Ok(())
}

/// Parse a run of RIFF chunks held in memory, such as the body of a FLAC
/// `riff` application block.
pub fn parse_chunks(mut data: &[u8], sources: &mut LoopSources) {
    while data.len() >= 8 {
        let id = [data[0], data[1], data[2], data[3]];
        let size = u32_at(data, 4).unwrap_or(0) as usize;
        let body_end = (8 + size).min(data.len());
        parse_chunk(&id, &data[8..body_end], sources);
        data = &data[(body_end + (size & 1)).min(data.len())..];
    }
}

/// Record the loop information in one chunk body.
pub fn parse_chunk(id: &[u8; 4], body: &[u8], sources: &mut LoopSources) {
    match id {
        b"cue " => parse_cue(body, sources),
        b"LIST" if body.starts_with(b"adtl") => parse_adtl(&body[4..], sources),
        b"LIST" if body.starts_with(b"INFO") => parse_info(&body[4..], sources),
        b"smpl" => parse_smpl(body, sources),
        _ => {}
    }
}

fn parse_cue(body: &[u8], sources: &mut LoopSources) {
    let count = u32_at(body, 0).unwrap_or(0) as usize;
    for point in body.get(4..).unwrap_or_default().chunks_exact(24).take(count) {
        if let (Some(id), Some(offset)) = (u32_at(point, 0), u32_at(point, 20)) {
            sources.add_cue_point(id, u64::from(offset));
        }
    }
}

fn parse_adtl(mut data: &[u8], sources: &mut LoopSources) {
    while data.len() >= 8 {
        let id = &data[..4];
        let size = u32_at(data, 4).unwrap_or(0) as usize;
        let body = &data[8..(8 + size).min(data.len())];

        match id {
            b"labl" => {
                if let Some(cue) = u32_at(body, 0) {
                    let text = &body[4..];
                    let text = text.split(|&b| b == 0).next().unwrap_or_default();
                    sources.set_cue_label(cue, &String::from_utf8_lossy(text));
                }
            }
            b"ltxt" => {
                if let (Some(cue), Some(length)) = (u32_at(body, 0), u32_at(body, 4)) {
                    sources.set_cue_length(cue, u64::from(length));
                }
            }
            _ => {}
        }

        let next = 8 + size + (size & 1);
        data = data.get(next..).unwrap_or_default();
    }
}

fn parse_info(mut data: &[u8], sources: &mut LoopSources) {
    while data.len() >= 8 {
        let size = u32_at(data, 4).unwrap_or(0) as usize;
        if &data[..4] == b"ICMT" {
            let body = &data[8..(8 + size).min(data.len())];
            let text = body.split(|&b| b == 0).next().unwrap_or_default();
            for line in String::from_utf8_lossy(text).lines() {
                sources.add_comment_line(line);
            }
        }
        let next = 8 + size + (size & 1);
        data = data.get(next..).unwrap_or_default();
    }
}

fn parse_smpl(body: &[u8], sources: &mut LoopSources) {
    let Some(loops) = u32_at(body, 28) else {
        return;
    };
    if loops == 0 {
        return;
    }
    if let (Some(start), Some(end), Some(play_count)) =
        (u32_at(body, 36 + 8), u32_at(body, 36 + 12), u32_at(body, 36 + 20))
    {
        sources.set_loop_chunk(LoopRegion {
            start: u64::from(start),
            end: u64::from(end),
            play_count,
        });
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use std::io::Cursor;

    fn wave(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend(body);
        out
    }

    fn resolved(sources: &LoopSources) -> (u64, u64, i32) {
        let mut meta = Metadata::default();
        meta.set_sample_count(50_000);
        sources.resolve(&mut meta);
        (meta.loop_start, meta.loop_end, meta.loop_count)
    }

    #[test]
    fn test_scan_cue_labels() {
        let data = wave(&[
            build::cue(&[(1, 1200), (2, 48_000)]),
            build::adtl(&[(1, "Loop Start"), (2, "loop end")], &[]),
        ]);
        let mut sources = LoopSources::default();
        scan(&mut Cursor::new(data), &mut sources).unwrap();
        assert_eq!(resolved(&sources), (1200, 48_000, -1));
    }

    #[test]
    fn test_scan_prefers_smpl() {
        let data = wave(&[
            build::cue(&[(1, 10)]),
            build::adtl(&[(1, "LOOP")], &[(1, 20)]),
            build::smpl(300, 40_000, 0),
        ]);
        let mut sources = LoopSources::default();
        scan(&mut Cursor::new(data), &mut sources).unwrap();
        assert_eq!(resolved(&sources), (300, 40_000, -1));
    }

    #[test]
    fn test_scan_info_comments() {
        let data = wave(&[build::info_comments(&["LoopStart=100", "LoopEnd=900"])]);
        let mut sources = LoopSources::default();
        scan(&mut Cursor::new(data), &mut sources).unwrap();
        assert_eq!(resolved(&sources), (100, 900, -1));
    }

    #[test]
    fn test_odd_sized_chunks_are_skipped_with_padding() {
        let mut odd = b"junk".to_vec();
        odd.extend_from_slice(&3u32.to_le_bytes());
        odd.extend_from_slice(&[1, 2, 3, 0]);
        let data = wave(&[odd, build::smpl(5, 50, 2)]);

        let mut sources = LoopSources::default();
        scan(&mut Cursor::new(data), &mut sources).unwrap();
        assert_eq!(resolved(&sources), (5, 50, 2));
    }

    #[test]
    fn test_parse_chunks_from_memory() {
        let data = [build::smpl(1, 2000, 0)].concat();
        let mut sources = LoopSources::default();
        parse_chunks(&data, &mut sources);
        assert_eq!(resolved(&sources), (1, 2000, -1));
    }

    #[test]
    fn test_rejects_non_wave() {
        let mut sources = LoopSources::default();
        let result = scan(&mut Cursor::new(b"OggS\0\0\0\0\0\0\0\0".to_vec()), &mut sources);
        assert!(matches!(result, Err(DecoderError::UnknownFormat(_))));
    }
}
