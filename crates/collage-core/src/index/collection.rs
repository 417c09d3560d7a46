//! Multi-scale index collection

use super::MetricIndex;
use crate::buffer::{AudioBuffer, WindowScale};
use crate::config::ms_to_frames;
use crate::distance::DistanceKind;
use crate::error::{CollageError, Result};
use crate::progress::ProgressHandle;
use collage_cache::CacheStore;

/// Best snippet across all scales for one query position
#[derive(Debug, Clone, Copy)]
pub struct BestMatch<'a> {
    pub snippet: &'a AudioBuffer,
    pub window_ms: WindowScale,
    /// Raw distance reported by the scale's index
    pub distance: f64,
    /// `distance / window_frames`
    pub normalized_distance: f64,
    pub window_frames: usize,
}

/// One [`MetricIndex`] per window scale, all sharing a distance function.
/// Scales are searched in insertion order.
#[derive(Debug)]
pub struct IndexCollection {
    distance: DistanceKind,
    cache: Option<CacheStore>,
    strict_cache: bool,
    progress: ProgressHandle,
    indices: Vec<(WindowScale, MetricIndex)>,
}

impl IndexCollection {
    pub fn new(distance: DistanceKind) -> Self {
        Self {
            distance,
            cache: None,
            strict_cache: false,
            progress: ProgressHandle::none(),
            indices: Vec::new(),
        }
    }

    pub fn with_cache(mut self, cache: Option<CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Propagate cache write failures instead of logging them
    pub fn with_strict_cache(mut self, strict: bool) -> Self {
        self.strict_cache = strict;
        self
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    pub fn distance(&self) -> DistanceKind {
        self.distance
    }

    /// Build and register the index for `window_ms`, replacing any existing
    /// index for that scale.
    pub fn add_index(&mut self, candidates: Vec<AudioBuffer>, window_ms: WindowScale) -> Result<()> {
        let mut index = MetricIndex::new(window_ms, self.distance)
            .with_cache(self.cache.clone())
            .with_strict_cache(self.strict_cache)
            .with_progress(self.progress.clone());
        index.build(candidates)?;

        match self.indices.iter_mut().find(|(scale, _)| *scale == window_ms) {
            Some(slot) => slot.1 = index,
            None => self.indices.push((window_ms, index)),
        }
        Ok(())
    }

    pub fn scales(&self) -> Vec<WindowScale> {
        self.indices.iter().map(|(scale, _)| *scale).collect()
    }

    pub fn get(&self, window_ms: WindowScale) -> Option<&MetricIndex> {
        self.indices
            .iter()
            .find(|(scale, _)| *scale == window_ms)
            .map(|(_, index)| index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Frame length of the longest scale at `sample_rate`
    pub fn max_window_frames(&self, sample_rate: u32) -> usize {
        self.indices
            .iter()
            .map(|(scale, _)| ms_to_frames(*scale, sample_rate))
            .max()
            .unwrap_or(0)
    }

    /// Best snippet for the start of `query` across every scale.
    ///
    /// Scales longer than the query are skipped. Distances are divided by the
    /// scale's frame length before comparison; the first scale wins ties.
    /// `Ok(None)` when no scale fits.
    pub fn find_best_match(&self, query: &AudioBuffer) -> Result<Option<BestMatch<'_>>> {
        if self.indices.is_empty() {
            return Err(CollageError::config("No window scales have been indexed"));
        }

        let mut best: Option<BestMatch<'_>> = None;
        for (scale, index) in &self.indices {
            let frames = ms_to_frames(*scale, query.sample_rate());
            if frames == 0 || query.len() < frames {
                continue;
            }

            let head = query.slice(0, frames);
            let (distance, snippet) = index.search(&head)?;
            let normalized = distance / frames as f64;
            log::trace!(
                "{}ms: distance {:.4} (normalized {:.6})",
                scale,
                distance,
                normalized
            );

            if best.map_or(true, |b| normalized < b.normalized_distance) {
                best = Some(BestMatch {
                    snippet,
                    window_ms: *scale,
                    distance,
                    normalized_distance: normalized,
                    window_frames: frames,
                });
            }
        }
        Ok(best)
    }
}
