//! .vpt file reader

use crate::error::{CacheError, Result};
use crate::format::{CacheHeader, CRC64, HEADER_LEN};
use memmap2::Mmap;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

pub struct CacheReader;

impl CacheReader {
    /// Read and validate a .vpt file, then decode its payload
    pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN as u64 {
            return Err(CacheError::Truncated {
                expected: HEADER_LEN as u64,
                found: len,
            });
        }

        // SAFETY: the map is read-only and dropped before this function
        // returns; cache files are replaced by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::decode(&mmap)
    }

    /// Decode an in-memory .vpt image
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        let header = CacheHeader::from_bytes(bytes)?;

        let stored = &bytes[HEADER_LEN..];
        if stored.len() as u64 != header.stored_size {
            return Err(CacheError::Truncated {
                expected: header.stored_size,
                found: stored.len() as u64,
            });
        }

        if CRC64.checksum(stored) != header.checksum {
            return Err(CacheError::ChecksumMismatch);
        }

        let value = if header.is_compressed() {
            let payload = zstd::decode_all(stored)
                .map_err(|e| CacheError::Compression(e.to_string()))?;
            if payload.len() as u64 != header.payload_size {
                return Err(CacheError::Truncated {
                    expected: header.payload_size,
                    found: payload.len() as u64,
                });
            }
            bincode::deserialize(&payload).map_err(CacheError::Decode)?
        } else {
            bincode::deserialize(stored).map_err(CacheError::Decode)?
        };

        Ok(value)
    }
}
