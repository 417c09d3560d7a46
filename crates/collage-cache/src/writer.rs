//! .vpt file writer

use crate::error::{CacheError, Result};
use crate::format::{CacheHeader, CRC64};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct CacheWriter {
    compress: bool,
    level: i32,
}

impl CacheWriter {
    pub fn new() -> Self {
        Self {
            compress: false,
            level: 3,
        }
    }

    /// Enable zstd compression of the payload
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Write `value` to `path`.
    ///
    /// The file is first written next to its destination and then renamed
    /// into place, so concurrent writers of the same key leave one complete
    /// file behind (last writer wins).
    pub fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let payload = bincode::serialize(value).map_err(CacheError::Encode)?;

        let stored = if self.compress {
            zstd::encode_all(&payload[..], self.level)
                .map_err(|e| CacheError::Compression(e.to_string()))?
        } else {
            payload.clone()
        };

        let mut header = CacheHeader::new(
            payload.len() as u64,
            stored.len() as u64,
            CRC64.checksum(&stored),
        );
        header.set_compressed(self.compress);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = temp_path_for(path);
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&header.to_bytes())?;
            writer.write_all(&stored)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, path)?;

        log::debug!(
            "Wrote cache file {} ({} bytes, compressed: {})",
            path.display(),
            stored.len(),
            self.compress
        );

        Ok(())
    }
}

impl Default for CacheWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.tmp", file_name, std::process::id()))
}
