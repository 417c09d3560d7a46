//! Tests for the metric index and index collection

use super::*;
use crate::progress::{Phase, RecordingSink, Stage};
use std::sync::Arc;

fn constant(value: f32, len: usize, rate: u32) -> AudioBuffer {
    AudioBuffer::new(vec![value; len], rate)
}

fn synthetic_set() -> Vec<AudioBuffer> {
    (0..4)
        .map(|k| {
            let samples = (0..10).map(|i| ((i * (k + 1)) as f32 * 0.3).sin()).collect();
            AudioBuffer::new(samples, 1000).with_offset(k * 10)
        })
        .collect()
}

#[test]
fn test_search_before_build() {
    let index = MetricIndex::new(100, DistanceKind::Waveform);
    let result = index.search(&constant(0.0, 100, 1000));
    assert!(matches!(result, Err(CollageError::IndexNotBuilt { window_ms: 100 })));
}

#[test]
fn test_build_empty_is_error() {
    let mut index = MetricIndex::new(100, DistanceKind::Waveform);
    let result = index.build(Vec::new());
    assert!(matches!(result, Err(CollageError::EmptyIndex { window_ms: 100 })));
    assert!(!index.is_built());
}

#[test]
fn test_search_returns_nearest() {
    let mut index = MetricIndex::new(10, DistanceKind::Waveform);
    index
        .build(vec![
            constant(0.0, 10, 1000),
            constant(0.5, 10, 1000),
            constant(1.0, 10, 1000),
        ])
        .unwrap();
    assert_eq!(index.len(), 3);

    let (distance, snippet) = index.search(&constant(0.6, 10, 1000)).unwrap();
    assert_eq!(snippet.samples()[0], 0.5);
    assert!((distance - 1.0).abs() < 1e-5);
}

#[test]
fn test_content_hash() {
    let a = synthetic_set();
    let b = synthetic_set();
    assert_eq!(content_hash(&a), content_hash(&b));
    assert_eq!(content_hash(&a).len(), 16);

    let mut c = synthetic_set();
    c[3] = c[3].clone().with_offset(99);
    assert_ne!(content_hash(&a), content_hash(&c));
    assert_ne!(content_hash(&a), content_hash(&a[..3]));
}

#[test]
fn test_cache_roundtrip_gives_same_answer() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let query = AudioBuffer::new((0..10).map(|i| (i as f32 * 0.5).sin()).collect(), 1000);

    let mut fresh = MetricIndex::new(10, DistanceKind::Mfcc).with_cache(Some(store.clone()));
    fresh.build(synthetic_set()).unwrap();
    let key = fresh.cache_key(&synthetic_set());
    assert!(store.contains(&key));

    let mut reloaded = MetricIndex::new(10, DistanceKind::Mfcc).with_cache(Some(store));
    reloaded.build(synthetic_set()).unwrap();

    let (d1, s1) = fresh.search(&query).unwrap();
    let (d2, s2) = reloaded.search(&query).unwrap();
    assert_eq!(d1, d2);
    assert_eq!(s1, s2);
}

#[test]
fn test_cache_hit_skips_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());

    MetricIndex::new(10, DistanceKind::Mfcc)
        .with_cache(Some(store.clone()))
        .build(synthetic_set())
        .unwrap();

    let recorder = Arc::new(RecordingSink::new());
    let mut index = MetricIndex::new(10, DistanceKind::Mfcc)
        .with_cache(Some(store))
        .with_progress(ProgressHandle::new(recorder.clone()));
    index.build(synthetic_set()).unwrap();

    assert!(recorder.events().is_empty());
    // Features travel with the cached snippets
    let tree = index.tree.as_ref().unwrap();
    assert!(tree.items().iter().all(|s| s.has_features()));
}

#[test]
fn test_corrupt_cache_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let keyed = MetricIndex::new(10, DistanceKind::Waveform);
    let key = keyed.cache_key(&synthetic_set());
    std::fs::write(store.path_for(&key), b"fake_data").unwrap();

    let recorder = Arc::new(RecordingSink::new());
    let mut index = MetricIndex::new(10, DistanceKind::Waveform)
        .with_cache(Some(store.clone()))
        .with_progress(ProgressHandle::new(recorder.clone()));
    index.build(synthetic_set()).unwrap();

    assert_eq!(index.len(), 4);
    let events = recorder.events();
    assert_eq!(events.first().map(|e| (e.phase, e.stage)), Some((Phase::Indexing, Stage::Started)));

    // The rebuilt index replaced the corrupt entry
    let reloaded: Option<VpTree<AudioBuffer>> = store.load(&key).unwrap();
    assert_eq!(reloaded.map(|t| t.len()), Some(4));

    let query = synthetic_set()[2].clone();
    let (distance, snippet) = index.search(&query).unwrap();
    assert_eq!(distance, 0.0);
    assert_eq!(snippet.offset_frames(), Some(20));
}

#[test]
fn test_collection_without_indices() {
    let collection = IndexCollection::new(DistanceKind::Waveform);
    assert!(collection.find_best_match(&constant(0.0, 100, 1000)).is_err());
}

#[test]
fn test_collection_skips_long_scales() {
    let mut collection = IndexCollection::new(DistanceKind::Waveform);
    collection.add_index(vec![constant(0.0, 200, 1000)], 200).unwrap();
    collection.add_index(vec![constant(0.0, 100, 1000)], 100).unwrap();

    let best = collection
        .find_best_match(&constant(0.0, 150, 1000))
        .unwrap()
        .unwrap();
    assert_eq!(best.window_ms, 100);
    assert_eq!(best.window_frames, 100);

    assert!(collection
        .find_best_match(&constant(0.0, 99, 1000))
        .unwrap()
        .is_none());
}

#[test]
fn test_normalization_flips_ranking() {
    // Raw distance favours 100ms (50 < 60); per-frame distance favours 200ms
    let mut collection = IndexCollection::new(DistanceKind::Waveform);
    collection.add_index(vec![constant(0.5, 100, 1000)], 100).unwrap();
    collection.add_index(vec![constant(0.7, 200, 1000)], 200).unwrap();

    let best = collection
        .find_best_match(&constant(1.0, 300, 1000))
        .unwrap()
        .unwrap();
    assert_eq!(best.window_ms, 200);
    assert!((best.distance - 60.0).abs() < 1e-3);
    assert!((best.normalized_distance - 0.3).abs() < 1e-6);
}

#[test]
fn test_first_scale_wins_ties() {
    let mut collection = IndexCollection::new(DistanceKind::Waveform);
    collection.add_index(vec![constant(1.0, 200, 1000)], 200).unwrap();
    collection.add_index(vec![constant(1.0, 100, 1000)], 100).unwrap();

    let best = collection
        .find_best_match(&constant(1.0, 300, 1000))
        .unwrap()
        .unwrap();
    assert_eq!(best.window_ms, 200);
}

#[test]
fn test_add_index_replaces_scale() {
    let mut collection = IndexCollection::new(DistanceKind::Waveform);
    collection.add_index(vec![constant(0.0, 100, 1000)], 100).unwrap();
    collection.add_index(vec![constant(1.0, 100, 1000)], 100).unwrap();
    assert_eq!(collection.scales(), vec![100]);

    let best = collection
        .find_best_match(&constant(1.0, 100, 1000))
        .unwrap()
        .unwrap();
    assert_eq!(best.distance, 0.0);
    assert_eq!(collection.max_window_frames(1000), 100);
}

#[test]
fn test_flipped_bytes_in_saved_index_are_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());

    let mut original = MetricIndex::new(10, DistanceKind::Mfcc).with_cache(Some(store.clone()));
    original.build(synthetic_set()).unwrap();
    let key = original.cache_key(&synthetic_set());

    let path = store.path_for(&key);
    let mut bytes = std::fs::read(&path).unwrap();
    let start = collage_cache::HEADER_LEN + 8;
    for byte in &mut bytes[start..start + 16] {
        *byte ^= 0xA5;
    }
    std::fs::write(&path, &bytes).unwrap();

    let recorder = Arc::new(RecordingSink::new());
    let mut index = MetricIndex::new(10, DistanceKind::Mfcc)
        .with_cache(Some(store.clone()))
        .with_progress(ProgressHandle::new(recorder.clone()));
    index.build(synthetic_set()).unwrap();

    assert!(recorder
        .events()
        .iter()
        .any(|e| e.phase == Phase::Indexing && e.stage == Stage::Started));
    assert_eq!(index.len(), 4);

    let query = synthetic_set()[1].clone();
    let (d1, s1) = original.search(&query).unwrap();
    let (d2, s2) = index.search(&query).unwrap();
    assert_eq!(d1, d2);
    assert_eq!(s1, s2);

    // The entry on disk was replaced with a readable one
    let reloaded: Option<VpTree<AudioBuffer>> = store.load(&key).unwrap();
    assert!(reloaded.is_some_and(|t| t.is_consistent()));
}

#[test]
fn test_inconsistent_cached_tree_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let distance = DistanceKind::Waveform;
    let key = MetricIndex::new(10, distance).cache_key(&synthetic_set());

    // Checksum-valid file holding a tree with no root
    let mut broken = VpTree::build(synthetic_set(), |a, b| distance.distance(a, b));
    broken.detach_root();
    store.save(&key, &broken).unwrap();

    let mut index = MetricIndex::new(10, distance).with_cache(Some(store));
    index.build(synthetic_set()).unwrap();

    let (d, snippet) = index.search(&synthetic_set()[3]).unwrap();
    assert_eq!(d, 0.0);
    assert_eq!(snippet.offset_frames(), Some(30));
}

#[test]
fn test_strict_cache_reports_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();
    let store = CacheStore::new(blocker.join("cache"));

    let mut lenient = MetricIndex::new(10, DistanceKind::Waveform).with_cache(Some(store.clone()));
    lenient.build(synthetic_set()).unwrap();
    assert!(lenient.is_built());

    let mut strict = MetricIndex::new(10, DistanceKind::Waveform)
        .with_cache(Some(store))
        .with_strict_cache(true);
    let result = strict.build(synthetic_set());
    assert!(matches!(result, Err(CollageError::Cache(_))));
    // The tree itself was built before the write failed
    assert!(strict.is_built());
}
