//! Mono audio buffer with memoized features

use crate::audio;
use crate::error::{CollageError, Result};
use crate::features::{shared_extractor, FeatureMatrix};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use std::sync::OnceLock;

/// Window length in milliseconds; identifies one level of the multi-scale search
pub type WindowScale = u32;

/// Immutable mono sample buffer.
///
/// Features are computed on first access and kept for the buffer's lifetime.
/// Cloning carries already computed features along.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "BufferData")]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    offset_frames: Option<usize>,
    source_path: Option<String>,

    mfcc: OnceLock<FeatureMatrix>,
    mfcc_mean: OnceLock<Vec<f32>>,
    chroma: OnceLock<FeatureMatrix>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            offset_frames: None,
            source_path: None,
            mfcc: OnceLock::new(),
            mfcc_mean: OnceLock::new(),
            chroma: OnceLock::new(),
        }
    }

    /// Empty buffer at `sample_rate`
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Decode an audio file, down-mixed to mono at `sample_rate`
    pub fn from_file(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let data = audio::decode_audio(path, sample_rate)
            .map_err(|e| CollageError::audio(format!("{:#}", e)))?;
        Ok(Self::new(data.samples, data.sample_rate)
            .with_source_path(path.to_string_lossy().into_owned()))
    }

    pub fn with_offset(mut self, offset_frames: usize) -> Self {
        self.offset_frames = Some(offset_frames);
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start of this buffer within the buffer it was cut from
    pub fn offset_frames(&self) -> Option<usize> {
        self.offset_frames
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Copy of frames `[start, end)`, clamped to the buffer. The offset is
    /// recorded relative to this buffer's own origin.
    pub fn slice(&self, start: usize, end: usize) -> AudioBuffer {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        let base = self.offset_frames.unwrap_or(0);
        let mut out = AudioBuffer::new(self.samples[start..end].to_vec(), self.sample_rate)
            .with_offset(base + start);
        out.source_path = self.source_path.clone();
        out
    }

    /// Frames from `start` to the end
    pub fn suffix(&self, start: usize) -> AudioBuffer {
        self.slice(start, self.samples.len())
    }

    pub fn mfcc(&self) -> &FeatureMatrix {
        self.mfcc
            .get_or_init(|| shared_extractor().mfcc(&self.samples, self.sample_rate))
    }

    pub fn mfcc_mean(&self) -> &[f32] {
        self.mfcc_mean.get_or_init(|| self.mfcc().mean())
    }

    pub fn chroma(&self) -> &FeatureMatrix {
        self.chroma
            .get_or_init(|| shared_extractor().chroma(&self.samples, self.sample_rate))
    }

    /// Whether any feature has been computed yet
    pub fn has_features(&self) -> bool {
        self.mfcc.get().is_some() || self.mfcc_mean.get().is_some() || self.chroma.get().is_some()
    }
}

/// Buffers compare by content; memoized features are ignored.
impl PartialEq for AudioBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.offset_frames == other.offset_frames
            && self.samples == other.samples
    }
}

#[derive(Serialize)]
struct BufferRef<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    offset_frames: Option<usize>,
    source_path: Option<&'a str>,
    mfcc: Option<&'a FeatureMatrix>,
    mfcc_mean: Option<&'a Vec<f32>>,
    chroma: Option<&'a FeatureMatrix>,
}

#[derive(Deserialize)]
struct BufferData {
    samples: Vec<f32>,
    sample_rate: u32,
    offset_frames: Option<usize>,
    source_path: Option<String>,
    mfcc: Option<FeatureMatrix>,
    mfcc_mean: Option<Vec<f32>>,
    chroma: Option<FeatureMatrix>,
}

// Computed features are persisted so a cached index needs no re-extraction.
impl Serialize for AudioBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        BufferRef {
            samples: &self.samples,
            sample_rate: self.sample_rate,
            offset_frames: self.offset_frames,
            source_path: self.source_path.as_deref(),
            mfcc: self.mfcc.get(),
            mfcc_mean: self.mfcc_mean.get(),
            chroma: self.chroma.get(),
        }
        .serialize(serializer)
    }
}

impl From<BufferData> for AudioBuffer {
    fn from(data: BufferData) -> Self {
        let mut buffer = AudioBuffer::new(data.samples, data.sample_rate);
        buffer.offset_frames = data.offset_frames;
        buffer.source_path = data.source_path;
        if let Some(mfcc) = data.mfcc {
            let _ = buffer.mfcc.set(mfcc);
        }
        if let Some(mean) = data.mfcc_mean {
            let _ = buffer.mfcc_mean.set(mean);
        }
        if let Some(chroma) = data.chroma {
            let _ = buffer.chroma.set(chroma);
        }
        buffer
    }
}
