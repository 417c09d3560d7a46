//! Error types for collage operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollageError>;

#[derive(Error, Debug)]
pub enum CollageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search index for {window_ms}ms windows was searched before it was built")]
    IndexNotBuilt { window_ms: u32 },

    #[error("No candidate snippets for {window_ms}ms windows (sample audio shorter than one window?)")]
    EmptyIndex { window_ms: u32 },

    #[error("Sample rate mismatch: expected {expected} Hz, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Cache error: {0}")]
    Cache(#[from] collage_cache::CacheError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollageError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::Audio(msg.into())
    }
}
