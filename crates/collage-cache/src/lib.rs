//! On-disk cache for built search indices
//!
//! Stores any serde-serializable structure in a small checksummed container
//! (`.vpt` files), keyed by source content hash, window length and distance name.

pub mod error;
pub mod format;
pub mod reader;
pub mod store;
pub mod writer;

pub use error::{CacheError, Result};
pub use format::{CacheHeader, CRC64, FLAG_COMPRESSED, HEADER_LEN, MAGIC, VERSION};
pub use reader::CacheReader;
pub use store::{CacheKey, CacheStore};
pub use writer::CacheWriter;
