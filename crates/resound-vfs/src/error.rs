//! Virtual filesystem error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving paths, parsing containers or reading bytes
#[derive(Debug, Error)]
pub enum VfsError {
    /// The resolved base directory is outside every allowed root
    #[error("path not allowed: {0}")]
    PathNotAllowed(PathBuf),

    /// The relative path is empty or climbs out of its base directory
    #[error("path '{path}' escapes base directory {base}")]
    PathEscapesBase {
        /// Relative path as supplied by the caller
        path: String,
        /// Resolved base directory
        base: PathBuf,
    },

    /// Malformed archive directory or asset table
    #[error("failed to parse container {path}: {reason}")]
    ContainerParse {
        /// Container path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Disk image content hash is not registered
    #[error("unknown container fingerprint {fingerprint} for {path}")]
    UnknownFingerprint {
        /// Container path
        path: PathBuf,
        /// Lowercase hex SHA-1 of the image
        fingerprint: String,
    },

    /// Archive has no member with this name
    #[error("archive member not found: {0}")]
    MemberNotFound(String),

    /// Archive member uses a compression method other than store/deflate
    #[error("unsupported compression method {method} for member {member}")]
    UnsupportedCompression {
        /// Member name
        member: String,
        /// Zip compression method id
        method: u16,
    },

    /// Compressed payload could not be expanded
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// No asset table entry contains this virtual offset
    #[error("no asset entry contains virtual offset 0x{0:08X}")]
    NoMatchingAsset(u64),

    /// The containing asset table entry is marked absent
    #[error("asset entry {index} containing virtual offset 0x{offset:08X} is absent")]
    AssetAbsent {
        /// Index of the entry in the asset table
        index: usize,
        /// Requested virtual offset
        offset: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for filesystem operations
pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ContainerParse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
