//! Codec identification

use crate::error::{DecoderError, DecoderResult};
use crate::ogg;
use crate::source::SourceReader;
use resound_vfs::ByteSource;
use std::fmt;
use std::sync::Arc;

/// Audio codec families.
///
/// The discriminants are the values used at the registration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum CodecType {
    /// Pick from extension and content
    #[default]
    Auto = 0,
    /// RIFF/WAVE PCM
    Wav = 1,
    /// FLAC, native or in Ogg
    Flac = 2,
    /// Ogg Vorbis
    Vorbis = 3,
    /// Ogg Opus
    Opus = 4,
    /// MPEG-1/2 layer III
    Mp3 = 5,
    /// AIFF PCM
    Aiff = 6,
}

impl CodecType {
    /// Parse a boundary value; unknown values mean `Auto`.
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::Wav,
            2 => Self::Flac,
            3 => Self::Vorbis,
            4 => Self::Opus,
            5 => Self::Mp3,
            6 => Self::Aiff,
            _ => Self::Auto,
        }
    }

    /// Codec implied by a lowercase file extension. `ogg` is ambiguous and
    /// yields `None`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" | "wave" => Some(Self::Wav),
            "aif" | "aiff" => Some(Self::Aiff),
            "flac" => Some(Self::Flac),
            "opus" => Some(Self::Opus),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Vorbis => "vorbis",
            Self::Opus => "opus",
            Self::Mp3 => "mp3",
            Self::Aiff => "aiff",
        };
        f.write_str(name)
    }
}

/// Decide which codec to use for `file`.
///
/// An explicit hint wins, then the extension, then (for Ogg containers) the
/// first packet.
pub fn resolve_codec(file: &Arc<dyn ByteSource>, hint: CodecType) -> DecoderResult<CodecType> {
    if hint != CodecType::Auto {
        return Ok(hint);
    }

    let ext = file.extension().unwrap_or_default();
    if let Some(codec) = CodecType::from_extension(&ext) {
        return Ok(codec);
    }

    if matches!(ext.as_str(), "ogg" | "oga") {
        let mut reader = SourceReader::new(Arc::clone(file))?;
        let codec = ogg::sniff_codec(&mut reader)?;
        file.close();
        return Ok(codec);
    }

    Err(DecoderError::UnknownFormat(format!(
        "cannot determine codec for {}",
        file.path().display()
    )))
}
