//! Fixtures written byte by byte: zip archives, disk images and WAV files

#![allow(dead_code, clippy::unwrap_used)]

use resound::{AudioCache, CacheConfig};
use std::io::Cursor;
use std::path::Path;

/// Manual-scheduling cache rooted at `root`, with `root` allowed.
pub fn cache(root: &Path, config: CacheConfig) -> AudioCache {
    let cache = AudioCache::manual(config).unwrap();
    cache.set_default_directory(root);
    cache.add_allowed_directory(root);
    cache
}

/// Zip archive of stored members.
pub fn stored_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, data) in members {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        let offset = out.len() as u32;
        let name = name.as_bytes();

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(data);

        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&[0u8; 4]);
        central.extend_from_slice(&crc.sum().to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0u8; 8]);
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name);
    }

    let directory_offset = out.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&directory_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// Yaz0 blob made only of literal tokens.
pub fn yaz0_literals(data: &[u8]) -> Vec<u8> {
    let mut out = b"Yaz0".to_vec();
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0u8; 8]);
    for group in data.chunks(8) {
        out.push(0xFF);
        out.extend_from_slice(group);
    }
    out
}

/// Write big-endian asset table rows plus a zero terminator at `offset`.
pub fn write_table(image: &mut Vec<u8>, offset: usize, rows: &[(u32, u32, u32, u32)]) {
    let end = offset + (rows.len() + 1) * 16;
    if image.len() < end {
        image.resize(end, 0);
    }
    for (i, row) in rows.iter().enumerate() {
        let at = offset + i * 16;
        for (j, field) in [row.0, row.1, row.2, row.3].iter().enumerate() {
            image[at + j * 4..at + j * 4 + 4].copy_from_slice(&field.to_be_bytes());
        }
    }
    image[end - 16..end].fill(0);
}

/// Hex SHA-1 the disk image reader matches fingerprints against.
pub fn fingerprint(image: &[u8]) -> String {
    resound_vfs::disk_image::fingerprint(&mut Cursor::new(image)).unwrap()
}

/// Sample value of `frame` in the WAV fixtures.
pub fn sample_at(frame: u64) -> i16 {
    (frame % 30_000) as i16
}

/// `smpl` chunk with one loop.
pub fn smpl(start: u32, end: u32, play_count: u32) -> Vec<u8> {
    let mut body = vec![0u8; 36];
    body[28..32].copy_from_slice(&1u32.to_le_bytes());
    let mut lp = vec![0u8; 24];
    lp[8..12].copy_from_slice(&start.to_le_bytes());
    lp[12..16].copy_from_slice(&end.to_le_bytes());
    lp[20..24].copy_from_slice(&play_count.to_le_bytes());
    body.extend(lp);

    let mut chunk = b"smpl".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend(body);
    chunk
}

/// Mono 16-bit WAV at 32 kHz where frame `i` holds `sample_at(i)`.
pub fn mono_wav(frames: u64, extra: &[Vec<u8>]) -> Vec<u8> {
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&32_000u32.to_le_bytes());
    fmt.extend_from_slice(&64_000u32.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());

    let mut data = Vec::new();
    for frame in 0..frames {
        data.extend_from_slice(&sample_at(frame).to_le_bytes());
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

/// Decode big-endian 16-bit samples.
pub fn be_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
