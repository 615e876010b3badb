//! Ogg first-page sniffing
//!
//! An `.ogg` file may carry Vorbis, Opus or FLAC. The codec is identified by
//! the start of the first packet on the first page.

use crate::codec::CodecType;
use crate::error::{DecoderError, DecoderResult};
use binrw::BinRead;
use std::io::{Read, Seek, SeekFrom};

/// Ogg page header, including the segment table
#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"OggS")]
pub struct OggPageHeader {
    /// Stream structure version, always 0
    pub version: u8,
    /// Continuation / BOS / EOS flags
    pub header_type: u8,
    /// Codec-defined position
    pub granule_position: u64,
    /// Logical bitstream serial number
    pub serial: u32,
    /// Page sequence number
    pub sequence: u32,
    /// CRC-32 of the page
    pub checksum: u32,
    /// Number of lacing values
    pub segment_count: u8,
    /// Lacing values
    #[br(count = usize::from(segment_count))]
    pub segments: Vec<u8>,
}

impl OggPageHeader {
    /// Length of the first packet starting on this page.
    pub fn first_packet_len(&self) -> usize {
        let mut len = 0;
        for &lacing in &self.segments {
            len += usize::from(lacing);
            if lacing < 255 {
                break;
            }
        }
        len
    }
}

/// Identify the codec of an Ogg stream from its first packet.
///
/// The reader is rewound to the start afterwards.
pub fn sniff_codec<R: Read + Seek>(reader: &mut R) -> DecoderResult<CodecType> {
    reader.seek(SeekFrom::Start(0))?;
    let header = OggPageHeader::read(reader)
        .map_err(|e| DecoderError::UnknownFormat(format!("not an Ogg stream: {e}")))?;

    let mut packet = vec![0u8; header.first_packet_len().min(16)];
    reader.read_exact(&mut packet)?;
    reader.seek(SeekFrom::Start(0))?;

    codec_for_packet(&packet)
        .ok_or_else(|| DecoderError::UnknownFormat("unrecognised Ogg packet".to_string()))
}

/// Map an Ogg identification packet prefix to a codec.
pub fn codec_for_packet(packet: &[u8]) -> Option<CodecType> {
    if packet.starts_with(b"\x01vorbis") {
        Some(CodecType::Vorbis)
    } else if packet.starts_with(b"OpusHead") {
        Some(CodecType::Opus)
    } else if packet.starts_with(b"\x7FFLAC") {
        Some(CodecType::Flac)
    } else {
        None
    }
}
