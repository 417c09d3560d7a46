//! Keyed cache directory

use crate::error::Result;
use crate::reader::CacheReader;
use crate::writer::CacheWriter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies one cached index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Content hash of the indexed audio
    pub source_hash: String,
    /// Window length the index was built for
    pub window_ms: u32,
    /// Name of the distance function
    pub distance: String,
}

impl CacheKey {
    pub fn new(source_hash: impl Into<String>, window_ms: u32, distance: impl Into<String>) -> Self {
        Self {
            source_hash: source_hash.into(),
            window_ms,
            distance: distance.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.{}.vpt", self.source_hash, self.window_ms, self.distance)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}ms/{}", self.source_hash, self.window_ms, self.distance)
    }
}

/// Filesystem-backed cache store
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    compress: bool,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            compress: false,
        }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).exists()
    }

    /// Load a cached value. `Ok(None)` when no entry exists for `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = CacheReader::read(&path)?;
        log::debug!("Cache hit: {}", path.display());
        Ok(Some(value))
    }

    pub fn save<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        CacheWriter::new()
            .compressed(self.compress)
            .write(&self.path_for(key), value)
    }

    /// Delete the entry for `key`, if present
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        values: Vec<f32>,
    }

    fn sample_entry() -> Entry {
        Entry {
            name: "snippet".to_string(),
            values: vec![0.25, -0.5, 1.0],
        }
    }

    #[test]
    fn test_key_file_name() {
        let key = CacheKey::new("00ff", 250, "mfcc");
        assert_eq!(key.file_name(), "00ff.250.mfcc.vpt");
    }

    #[test]
    fn test_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let loaded: Option<Entry> = store.load(&CacheKey::new("abc", 10, "mfcc")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested"));
        let key = CacheKey::new("abc", 10, "mfcc");

        store.save(&key, &sample_entry()).unwrap();
        assert!(store.contains(&key));

        let loaded: Entry = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded, sample_entry());
    }

    #[test]
    fn test_compressed_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path()).with_compression(true);
        let key = CacheKey::new("abc", 10, "fast_mfcc");

        store.save(&key, &sample_entry()).unwrap();
        let loaded: Entry = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded, sample_entry());
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let key = CacheKey::new("abc", 10, "mfcc");
        store.save(&key, &sample_entry()).unwrap();

        let path = store.path_for(&key);
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let result: Result<Option<Entry>> = store.load(&key);
        assert!(matches!(result, Err(CacheError::ChecksumMismatch)));
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let key = CacheKey::new("abc", 10, "mfcc");
        std::fs::write(store.path_for(&key), b"fake_data").unwrap();

        let result: Result<Option<Entry>> = store.load(&key);
        assert!(matches!(result, Err(CacheError::Truncated { .. })));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let key = CacheKey::new("abc", 10, "mfcc");
        store.save(&key, &sample_entry()).unwrap();

        store.remove(&key).unwrap();
        assert!(!store.contains(&key));
        // Removing twice is fine
        store.remove(&key).unwrap();
    }
}
