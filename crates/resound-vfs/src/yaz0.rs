//! Yaz0 decompression
//!
//! Compressed disk-image entries start with a 16-byte header followed by a
//! token stream:
//!
//! ```text
//! 0x00  [u8; 4]  magic "Yaz0"
//! 0x04  u32 BE   decompressed size
//! 0x08  [u8; 8]  padding
//! 0x10  ...      groups of (control byte, up to 8 tokens)
//! ```
//!
//! Each control bit, most significant first, selects a literal byte (1) or a
//! back-reference (0). A back-reference is `b1 b2 [b3]`: distance is
//! `((b1 & 0x0F) << 8 | b2) + 1`; length is `(b1 >> 4) + 2` when the high
//! nibble is non-zero, otherwise `b3 + 0x12`.

use crate::error::{VfsError, VfsResult};

/// Header magic
pub const YAZ0_MAGIC: [u8; 4] = *b"Yaz0";

/// Header length preceding the token stream
pub const YAZ0_HEADER_SIZE: usize = 0x10;

/// Maximum allowed decompressed size (256 MB)
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Decompress a full Yaz0 blob, header included.
pub fn decompress(data: &[u8]) -> VfsResult<Vec<u8>> {
    if data.len() < YAZ0_HEADER_SIZE {
        return Err(VfsError::Decompression(format!(
            "Yaz0 blob too short: {} bytes",
            data.len()
        )));
    }
    if data[..4] != YAZ0_MAGIC {
        return Err(VfsError::Decompression(format!(
            "invalid Yaz0 magic: {:02X?}",
            &data[..4]
        )));
    }

    let size = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    decompress_tokens(&data[YAZ0_HEADER_SIZE..], size)
}

/// Expand a headerless token stream into exactly `size` bytes.
pub fn decompress_tokens(src: &[u8], size: usize) -> VfsResult<Vec<u8>> {
    if size > MAX_DECOMPRESSED_SIZE {
        return Err(VfsError::Decompression(format!(
            "decompressed size {size} exceeds limit {MAX_DECOMPRESSED_SIZE}"
        )));
    }

    let truncated = || VfsError::Decompression("Yaz0 token stream truncated".to_string());

    let mut out = Vec::with_capacity(size);
    let mut src_pos = 0usize;
    let mut control = 0u8;
    let mut bits_left = 0u32;

    while out.len() < size {
        if bits_left == 0 {
            control = *src.get(src_pos).ok_or_else(truncated)?;
            src_pos += 1;
            bits_left = 8;
        }

        if control & 0x80 != 0 {
            out.push(*src.get(src_pos).ok_or_else(truncated)?);
            src_pos += 1;
        } else {
            let b1 = *src.get(src_pos).ok_or_else(truncated)?;
            let b2 = *src.get(src_pos + 1).ok_or_else(truncated)?;
            src_pos += 2;

            let distance = ((usize::from(b1 & 0x0F) << 8) | usize::from(b2)) + 1;
            let length = if b1 >> 4 == 0 {
                let b3 = *src.get(src_pos).ok_or_else(truncated)?;
                src_pos += 1;
                usize::from(b3) + 0x12
            } else {
                usize::from(b1 >> 4) + 2
            };

            if distance > out.len() {
                return Err(VfsError::Decompression(format!(
                    "back-reference distance {distance} exceeds output length {}",
                    out.len()
                )));
            }

            // Byte by byte: runs may overlap the bytes they produce.
            let start = out.len() - distance;
            let length = length.min(size - out.len());
            for i in 0..length {
                let byte = out[start + i];
                out.push(byte);
            }
        }

        control <<= 1;
        bits_left -= 1;
    }

    Ok(out)
}
