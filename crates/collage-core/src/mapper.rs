//! Greedy windowed scan of the target

use crate::buffer::AudioBuffer;
use crate::chop::chop;
use crate::config::{ms_to_frames, CollageConfig};
use crate::error::{CollageError, Result};
use crate::index::IndexCollection;
use crate::progress::{Phase, ProgressHandle};
use collage_cache::CacheStore;
use rayon::prelude::*;

/// Indexes the sample audio at every configured scale, then maps target
/// audio onto snippets of it.
#[derive(Debug)]
pub struct Mapper<'a> {
    config: &'a CollageConfig,
    collection: IndexCollection,
    sample_rate: u32,
}

impl<'a> Mapper<'a> {
    /// Chop and index `sample` for every window in `config`.
    ///
    /// Each window is widened by the crossfade length so every candidate
    /// carries the margin its own crossfade consumes.
    pub fn new(sample: &AudioBuffer, config: &'a CollageConfig) -> Result<Self> {
        let cache = match config.cache_dir() {
            Some(dir) => {
                // Fail before indexing when strict writes cannot succeed
                if config.strict_cache() {
                    std::fs::create_dir_all(dir)?;
                }
                Some(CacheStore::new(dir).with_compression(config.compress_cache()))
            }
            None => None,
        };
        let mut collection = IndexCollection::new(config.distance_fn())
            .with_cache(cache)
            .with_strict_cache(config.strict_cache())
            .with_progress(config.progress().clone());

        for scale in config.window_scales()? {
            let candidates = chop(sample, scale, config.chop_step(), config.progress());
            log::debug!("{}ms scale: {} candidate snippets", scale, candidates.len());
            collection.add_index(candidates, scale)?;
        }

        Ok(Self {
            config,
            collection,
            sample_rate: sample.sample_rate(),
        })
    }

    pub fn collection(&self) -> &IndexCollection {
        &self.collection
    }

    /// Selected snippets for `target`, in target order.
    ///
    /// With more than one configured worker the target is split into
    /// contiguous chunks that are scanned independently.
    pub fn map_audio(&self, target: &AudioBuffer) -> Result<Vec<AudioBuffer>> {
        if target.sample_rate() != self.sample_rate {
            return Err(CollageError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: target.sample_rate(),
            });
        }

        let chunks = self.chunk_bounds(target);
        if chunks.len() <= 1 {
            return self.scan(target, self.config.progress());
        }

        let progress = self.config.progress();
        progress.start(
            Phase::Selecting,
            target.len(),
            format!("Selecting samples with {} workers", chunks.len()),
        );
        log::info!("Scanning target in {} parallel chunks", chunks.len());

        let quiet = ProgressHandle::none();
        let per_chunk = chunks
            .par_iter()
            .map(|&(start, end)| {
                let selected = self.scan(&target.slice(start, end), &quiet);
                progress.step(Phase::Selecting, end);
                selected
            })
            .collect::<Result<Vec<_>>>()?;

        progress.complete(Phase::Selecting, target.len());
        Ok(per_chunk.into_iter().flatten().collect())
    }

    /// Contiguous `[start, end)` chunks for the configured worker count.
    /// Every chunk spans at least one longest window.
    fn chunk_bounds(&self, target: &AudioBuffer) -> Vec<(usize, usize)> {
        let total = target.len();
        let longest = self.collection.max_window_frames(target.sample_rate()).max(1);
        let workers = self.config.workers().min(total / longest).max(1);

        let chunk_len = total.div_ceil(workers).max(1);
        (0..workers)
            .map(|i| (i * chunk_len, ((i + 1) * chunk_len).min(total)))
            .filter(|(start, end)| start < end)
            .collect()
    }

    /// Single-pointer greedy scan; the pointer starts at 0 of `target`.
    fn scan(&self, target: &AudioBuffer, progress: &ProgressHandle) -> Result<Vec<AudioBuffer>> {
        let total = target.len();
        let rate = target.sample_rate();
        let overlap = ms_to_frames(self.config.crossfade_ms(), rate);
        let longest = self.collection.max_window_frames(rate);

        progress.start(
            Phase::Selecting,
            total,
            format!("Selecting samples for {} frames", total),
        );

        let mut selected = Vec::new();
        let mut pointer = 0;
        while pointer < total {
            let query = target.slice(pointer, pointer + longest);
            let Some(best) = self.collection.find_best_match(&query)? else {
                log::debug!("{} trailing frames shorter than every window", total - pointer);
                break;
            };
            log::trace!(
                "frame {}: {}ms snippet from offset {:?}",
                pointer,
                best.window_ms,
                best.snippet.offset_frames()
            );
            selected.push(best.snippet.clone());
            pointer += best.window_frames.saturating_sub(overlap).max(1);
            progress.step(Phase::Selecting, pointer.min(total));
        }

        progress.complete(Phase::Selecting, total);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declick::DeclickShape;
    use crate::distance::DistanceKind;

    fn waveform_config(windows: Vec<u32>) -> CollageConfig {
        CollageConfig::builder()
            .windows(windows)
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(None)
            .cache_dir(None)
            .build()
            .unwrap()
    }

    fn ramp(len: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::new((0..len).map(|i| (i as f32 * 0.01).sin()).collect(), rate)
    }

    #[test]
    fn test_indexes_every_scale() {
        let config = waveform_config(vec![500, 200]);
        let mapper = Mapper::new(&ramp(2000, 1000), &config).unwrap();
        assert_eq!(mapper.collection().scales(), vec![500, 200]);
        assert_eq!(mapper.collection().get(500).unwrap().len(), 4);
        assert_eq!(mapper.collection().get(200).unwrap().len(), 10);
    }

    #[test]
    fn test_scales_include_crossfade_margin() {
        let config = CollageConfig::builder()
            .windows(vec![100])
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(Some(DeclickShape::Linear))
            .declick_ms(20)
            .cache_dir(None)
            .build()
            .unwrap();
        let mapper = Mapper::new(&ramp(1000, 1000), &config).unwrap();
        assert_eq!(mapper.collection().scales(), vec![120]);

        let selected = mapper.map_audio(&ramp(500, 1000)).unwrap();
        // Pointer advances by 120 - 20 frames: starts 0, 100, 200, 300
        assert_eq!(selected.len(), 4);
        assert!(selected.iter().all(|s| s.len() == 120));
    }

    #[test]
    fn test_exact_copy_is_found() {
        let sample = ramp(2000, 1000);
        let config = waveform_config(vec![200]);
        let mapper = Mapper::new(&sample, &config).unwrap();

        let target = sample.slice(400, 1000);
        let selected = mapper.map_audio(&AudioBuffer::new(target.samples().to_vec(), 1000)).unwrap();
        let offsets: Vec<_> = selected.iter().map(|s| s.offset_frames().unwrap()).collect();
        assert_eq!(offsets, vec![400, 600, 800]);
    }

    #[test]
    fn test_short_target_yields_nothing() {
        let config = waveform_config(vec![500]);
        let mapper = Mapper::new(&ramp(2000, 1000), &config).unwrap();
        assert!(mapper.map_audio(&ramp(100, 1000)).unwrap().is_empty());
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let config = waveform_config(vec![100]);
        let mapper = Mapper::new(&ramp(2000, 1000), &config).unwrap();
        assert!(matches!(
            mapper.map_audio(&ramp(500, 2000)),
            Err(CollageError::SampleRateMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_shorter_than_window() {
        let config = waveform_config(vec![800]);
        let result = Mapper::new(&ramp(100, 1000), &config);
        assert!(matches!(result, Err(CollageError::EmptyIndex { window_ms: 800 })));
    }

    #[test]
    fn test_parallel_matches_chunked_serial_scan() {
        let sample = ramp(3000, 1000);
        let target = AudioBuffer::new((0..1200).map(|i| (i as f32 * 0.013).cos()).collect(), 1000);

        let serial_config = waveform_config(vec![200, 100]);
        let serial = Mapper::new(&sample, &serial_config).unwrap();
        let mut expected = Vec::new();
        for (start, end) in [(0, 400), (400, 800), (800, 1200)] {
            expected.extend(serial.map_audio(&target.slice(start, end)).unwrap());
        }

        let parallel_config = CollageConfig::builder()
            .windows(vec![200, 100])
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(None)
            .cache_dir(None)
            .workers(3)
            .build()
            .unwrap();
        let parallel = Mapper::new(&sample, &parallel_config).unwrap();
        let selected = parallel.map_audio(&target).unwrap();

        assert_eq!(selected, expected);
    }

    #[test]
    fn test_strict_cache_requires_writable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let config = CollageConfig::builder()
            .windows(vec![100])
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(None)
            .cache_dir(Some(blocker.join("cache")))
            .strict_cache(true)
            .build()
            .unwrap();
        let result = Mapper::new(&ramp(1000, 1000), &config);
        assert!(matches!(result, Err(CollageError::Io(_))));
    }

    #[test]
    fn test_unwritable_cache_is_tolerated_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let config = CollageConfig::builder()
            .windows(vec![100])
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(None)
            .cache_dir(Some(blocker.join("cache")))
            .build()
            .unwrap();
        let mapper = Mapper::new(&ramp(1000, 1000), &config).unwrap();
        assert_eq!(mapper.collection().get(100).unwrap().len(), 10);
    }

    #[test]
    fn test_chunk_count_limited_by_longest_window() {
        let config = CollageConfig::builder()
            .windows(vec![400])
            .distance_fn(DistanceKind::Waveform)
            .declick_fn(None)
            .cache_dir(None)
            .workers(8)
            .build()
            .unwrap();
        let mapper = Mapper::new(&ramp(2000, 1000), &config).unwrap();
        let chunks = mapper.chunk_bounds(&ramp(1000, 1000));
        assert_eq!(chunks, vec![(0, 500), (500, 1000)]);
    }
}
