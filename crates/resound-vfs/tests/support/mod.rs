//! Byte-level builders for zip archives and disk images

#![allow(dead_code, clippy::unwrap_used)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// One zip member to write
pub struct Member<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub deflate: bool,
}

/// Build a zip archive in memory.
pub fn build_zip(members: &[Member<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for member in members {
        let mut crc = flate2::Crc::new();
        crc.update(member.data);

        let (method, payload) = if member.deflate {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(member.data).unwrap();
            (8u16, encoder.finish().unwrap())
        } else {
            (0u16, member.data.to_vec())
        };

        let offset = out.len() as u32;
        let name = member.name.as_bytes();

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(member.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&payload);

        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&[0u8; 4]);
        central.extend_from_slice(&crc.sum().to_le_bytes());
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(member.data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name);
    }

    let directory_offset = out.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&directory_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// Wrap raw bytes as a Yaz0 blob made only of literal tokens.
pub fn yaz0_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"Yaz0");
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0u8; 8]);
    for group in data.chunks(8) {
        out.push(0xFF);
        out.extend_from_slice(group);
    }
    out
}

/// One asset table row: (virtual start, virtual end, physical start, physical end)
pub type Row = (u32, u32, u32, u32);

/// Append a big-endian asset table (plus terminator) to `image` at `offset`.
pub fn write_table(image: &mut Vec<u8>, offset: usize, rows: &[Row]) {
    let end = offset + (rows.len() + 1) * 16;
    if image.len() < end {
        image.resize(end, 0);
    }
    for (i, (vs, ve, ps, pe)) in rows.iter().enumerate() {
        let at = offset + i * 16;
        image[at..at + 4].copy_from_slice(&vs.to_be_bytes());
        image[at + 4..at + 8].copy_from_slice(&ve.to_be_bytes());
        image[at + 8..at + 12].copy_from_slice(&ps.to_be_bytes());
        image[at + 12..at + 16].copy_from_slice(&pe.to_be_bytes());
    }
    image[end - 16..end].fill(0);
}

/// Lowercase hex SHA-1.
pub fn sha1_hex(data: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    hex::encode(Sha1::digest(data))
}
