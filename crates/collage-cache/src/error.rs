//! Error types for cache reads and writes

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache file: magic bytes mismatch")]
    InvalidMagic,

    #[error("Unsupported cache file version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Cache file checksum mismatch")]
    ChecksumMismatch,

    #[error("Cache file truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("Failed to encode cache payload: {0}")]
    Encode(#[source] bincode::Error),

    #[error("Failed to decode cache payload: {0}")]
    Decode(#[source] bincode::Error),

    #[error("Compression error: {0}")]
    Compression(String),
}
