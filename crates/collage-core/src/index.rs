//! Per-scale nearest-neighbour index over chopped snippets
//!
//! A [`MetricIndex`] holds the vantage-point tree for one window scale and
//! persists it through the on-disk cache, keyed by a content hash of the
//! candidate snippets, the scale and the distance function.

mod collection;

#[cfg(test)]
mod tests;

pub use collection::{BestMatch, IndexCollection};

use crate::buffer::{AudioBuffer, WindowScale};
use crate::distance::DistanceKind;
use crate::error::{CollageError, Result};
use crate::progress::{Phase, ProgressHandle};
use crate::vptree::VpTree;
use collage_cache::{CacheKey, CacheStore, CRC64};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic hash of a candidate set: CRC-64 over every snippet's
/// samples, sample rate and offset, as 16 hex digits.
pub fn content_hash(buffers: &[AudioBuffer]) -> String {
    let mut digest = CRC64.digest();
    digest.update(&(buffers.len() as u64).to_le_bytes());
    for buffer in buffers {
        let bytes: Vec<u8> = buffer
            .samples()
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        digest.update(&(bytes.len() as u64).to_le_bytes());
        digest.update(&bytes);
        digest.update(&buffer.sample_rate().to_le_bytes());
        let offset = buffer.offset_frames().map_or(u64::MAX, |o| o as u64);
        digest.update(&offset.to_le_bytes());
    }
    format!("{:016x}", digest.finalize())
}

/// Nearest-neighbour index for one window scale
#[derive(Debug)]
pub struct MetricIndex {
    window_ms: WindowScale,
    distance: DistanceKind,
    cache: Option<CacheStore>,
    strict_cache: bool,
    progress: ProgressHandle,
    tree: Option<VpTree<AudioBuffer>>,
}

impl MetricIndex {
    pub fn new(window_ms: WindowScale, distance: DistanceKind) -> Self {
        Self {
            window_ms,
            distance,
            cache: None,
            strict_cache: false,
            progress: ProgressHandle::none(),
            tree: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Return cache write failures from `build` instead of logging them
    pub fn with_strict_cache(mut self, strict: bool) -> Self {
        self.strict_cache = strict;
        self
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    pub fn window_ms(&self) -> WindowScale {
        self.window_ms
    }

    pub fn distance(&self) -> DistanceKind {
        self.distance
    }

    pub fn is_built(&self) -> bool {
        self.tree.is_some()
    }

    /// Number of indexed snippets (0 before `build`)
    pub fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache key for a candidate set
    pub fn cache_key(&self, candidates: &[AudioBuffer]) -> CacheKey {
        CacheKey::new(content_hash(candidates), self.window_ms, self.distance.name())
    }

    /// Build the tree over `candidates`, or adopt a cached one.
    ///
    /// Unreadable or inconsistent cache entries are deleted and rebuilt. A
    /// failed cache write is logged, or returned in strict mode.
    pub fn build(&mut self, candidates: Vec<AudioBuffer>) -> Result<()> {
        if candidates.is_empty() {
            return Err(CollageError::EmptyIndex {
                window_ms: self.window_ms,
            });
        }

        let key = self.cache_key(&candidates);
        if let Some(tree) = self.load_cached(&key, candidates.len()) {
            log::info!(
                "Loaded {}ms index from cache ({} snippets)",
                self.window_ms,
                tree.len()
            );
            self.tree = Some(tree);
            return Ok(());
        }

        let total = candidates.len();
        self.progress.start(
            Phase::Indexing,
            total,
            format!("Indexing {} snippets of {}ms", total, self.window_ms),
        );

        let distance = self.distance;
        let done = AtomicUsize::new(0);
        candidates.par_iter().for_each(|snippet| {
            distance.prepare(snippet);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            self.progress.step(Phase::Indexing, current);
        });

        let tree = VpTree::build(candidates, |a, b| distance.distance(a, b));
        self.progress.complete(Phase::Indexing, total);
        log::info!("Built {}ms index ({} snippets)", self.window_ms, tree.len());

        let saved = match &self.cache {
            Some(store) => match store.save(&key, &tree) {
                Ok(()) => {
                    log::debug!("Cached {}ms index at {}", self.window_ms, store.path_for(&key).display());
                    Ok(())
                }
                Err(e) if self.strict_cache => Err(e),
                Err(e) => {
                    log::warn!("Failed to cache {}ms index: {}", self.window_ms, e);
                    Ok(())
                }
            },
            None => Ok(()),
        };

        self.tree = Some(tree);
        saved?;
        Ok(())
    }

    fn load_cached(&self, key: &CacheKey, expected_len: usize) -> Option<VpTree<AudioBuffer>> {
        let store = self.cache.as_ref()?;
        match store.load::<VpTree<AudioBuffer>>(key) {
            Ok(Some(tree)) if tree.len() == expected_len && tree.is_consistent() => Some(tree),
            Ok(Some(tree)) => {
                log::warn!(
                    "Cached index {} is inconsistent ({} snippets, expected {}); rebuilding",
                    key,
                    tree.len(),
                    expected_len
                );
                self.discard(store, key);
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to load cached index {}: {}; rebuilding", key, e);
                self.discard(store, key);
                None
            }
        }
    }

    fn discard(&self, store: &CacheStore, key: &CacheKey) {
        if let Err(e) = store.remove(key) {
            log::warn!("Failed to delete cache entry {}: {}", key, e);
        }
    }

    /// Nearest snippet to `query` and its raw distance
    pub fn search(&self, query: &AudioBuffer) -> Result<(f64, &AudioBuffer)> {
        let tree = self.tree.as_ref().ok_or(CollageError::IndexNotBuilt {
            window_ms: self.window_ms,
        })?;
        let distance = self.distance;
        tree.nearest(query, |q, candidate| distance.distance(q, candidate))
            .ok_or(CollageError::EmptyIndex {
                window_ms: self.window_ms,
            })
    }
}
