//! Decoder error types

use resound_vfs::VfsError;
use thiserror::Error;

/// Errors raised while probing or decoding audio
#[derive(Debug, Error)]
pub enum DecoderError {
    /// No codec could be determined for the stream
    #[error("unknown audio format: {0}")]
    UnknownFormat(String),

    /// The stream is malformed or could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Fewer frames were produced than the stream claims to hold
    #[error("short decode at frame {offset}: requested {requested} frames, got {produced}")]
    ShortDecode {
        /// First frame of the request
        offset: u64,
        /// Frames requested
        requested: usize,
        /// Frames produced
        produced: usize,
    },

    /// The codec is recognised but no decoder is available for it
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Operation needs an open decoder
    #[error("decoder is not open")]
    NotOpen,

    /// Underlying byte source failed
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// Error from the symphonia demuxers or codecs
    #[error("symphonia: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),

    /// Error from the WAV reader
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for decoder operations
pub type DecoderResult<T> = Result<T, DecoderError>;
