//! Configuration parameters for collage generation
//!
//! Defaults match the original tool's defaults.

use crate::declick::DeclickShape;
use crate::distance::DistanceKind;
use crate::error::{CollageError, Result};
use crate::progress::ProgressHandle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default window scales in milliseconds, longest first
pub const DEFAULT_WINDOWS: [u32; 5] = [800, 400, 200, 100, 50];

/// Default working sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Default cache directory
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// How far the chopper advances between consecutive snippets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChopStep {
    /// One full window (non-overlapping tiling)
    Window,
    /// Fixed step in milliseconds
    Fixed(u32),
    /// Fraction of the window length
    Ratio(f64),
}

impl ChopStep {
    /// Resolve from the two mutually exclusive options
    pub fn from_options(step_ms: Option<u32>, step_factor: Option<f64>) -> Result<Self> {
        match (step_ms, step_factor) {
            (Some(_), Some(_)) => Err(CollageError::config(
                "Cannot specify both 'step_ms' and 'step_factor'",
            )),
            (Some(ms), None) => {
                if ms == 0 {
                    return Err(CollageError::config("step_ms must be > 0"));
                }
                Ok(ChopStep::Fixed(ms))
            }
            (None, Some(ratio)) => {
                if !(ratio > 0.0) || !ratio.is_finite() {
                    return Err(CollageError::config("step_factor must be a positive number"));
                }
                Ok(ChopStep::Ratio(ratio))
            }
            (None, None) => Ok(ChopStep::Window),
        }
    }

    /// Step length in frames for a window of `window_ms` at `sample_rate`
    pub fn frames(&self, window_ms: u32, sample_rate: u32) -> usize {
        let rate = sample_rate as f64;
        match *self {
            ChopStep::Window => ms_to_frames(window_ms, sample_rate),
            ChopStep::Fixed(ms) => ms_to_frames(ms, sample_rate),
            ChopStep::Ratio(ratio) => (window_ms as f64 * ratio / 1000.0 * rate).floor() as usize,
        }
    }
}

/// `floor(ms / 1000 * rate)`
pub fn ms_to_frames(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Immutable collage configuration. Build with [`CollageConfig::builder`].
///
/// Deserialization goes through the same validation as the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawCollageConfig", into = "RawCollageConfig")]
pub struct CollageConfig {
    target_file: Option<String>,
    sample_file: Option<String>,
    outpath: Option<String>,

    windows: Vec<u32>,
    distance_fn: DistanceKind,

    declick_fn: Option<DeclickShape>,
    declick_ms: u32,

    step_ms: Option<u32>,
    step_factor: Option<f64>,
    /// Resolved from `step_ms` / `step_factor` on validation
    chop_step: ChopStep,

    sample_rate: u32,
    cache_dir: Option<PathBuf>,
    compress_cache: bool,
    strict_cache: bool,
    workers: usize,

    progress: ProgressHandle,
}

/// Serialized form of [`CollageConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawCollageConfig {
    target_file: Option<String>,
    sample_file: Option<String>,
    outpath: Option<String>,
    windows: Vec<u32>,
    distance_fn: DistanceKind,
    declick_fn: Option<DeclickShape>,
    declick_ms: u32,
    step_ms: Option<u32>,
    step_factor: Option<f64>,
    sample_rate: u32,
    cache_dir: Option<PathBuf>,
    compress_cache: bool,
    strict_cache: bool,
    workers: usize,
}

impl Default for RawCollageConfig {
    fn default() -> Self {
        CollageConfig::default().into()
    }
}

impl From<CollageConfig> for RawCollageConfig {
    fn from(config: CollageConfig) -> Self {
        Self {
            target_file: config.target_file,
            sample_file: config.sample_file,
            outpath: config.outpath,
            windows: config.windows,
            distance_fn: config.distance_fn,
            declick_fn: config.declick_fn,
            declick_ms: config.declick_ms,
            step_ms: config.step_ms,
            step_factor: config.step_factor,
            sample_rate: config.sample_rate,
            cache_dir: config.cache_dir,
            compress_cache: config.compress_cache,
            strict_cache: config.strict_cache,
            workers: config.workers,
        }
    }
}

impl TryFrom<RawCollageConfig> for CollageConfig {
    type Error = CollageError;

    fn try_from(raw: RawCollageConfig) -> Result<Self> {
        CollageConfig {
            target_file: raw.target_file,
            sample_file: raw.sample_file,
            outpath: raw.outpath,
            windows: raw.windows,
            distance_fn: raw.distance_fn,
            declick_fn: raw.declick_fn,
            declick_ms: raw.declick_ms,
            step_ms: raw.step_ms,
            step_factor: raw.step_factor,
            chop_step: ChopStep::Window,
            sample_rate: raw.sample_rate,
            cache_dir: raw.cache_dir,
            compress_cache: raw.compress_cache,
            strict_cache: raw.strict_cache,
            workers: raw.workers,
            progress: ProgressHandle::none(),
        }
        .resolved()
    }
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            target_file: None,
            sample_file: None,
            outpath: None,
            windows: DEFAULT_WINDOWS.to_vec(),
            distance_fn: DistanceKind::Mfcc,
            declick_fn: Some(DeclickShape::Sigmoid),
            declick_ms: 0,
            step_ms: None,
            step_factor: None,
            chop_step: ChopStep::Window,
            sample_rate: DEFAULT_SAMPLE_RATE,
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
            compress_cache: false,
            strict_cache: false,
            workers: 1,
            progress: ProgressHandle::none(),
        }
    }
}

impl CollageConfig {
    pub fn builder() -> CollageConfigBuilder {
        CollageConfigBuilder {
            config: CollageConfig::default(),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        ChopStep::from_options(self.step_ms, self.step_factor)?;
        if self.windows.is_empty() {
            return Err(CollageError::config("At least one window size is required"));
        }
        if self.windows.iter().any(|&w| w == 0) {
            return Err(CollageError::config("Window sizes must be > 0 ms"));
        }
        self.window_scales()?;
        if self.sample_rate == 0 {
            return Err(CollageError::config("Sample rate must be > 0"));
        }
        if self.workers == 0 {
            return Err(CollageError::config("workers must be >= 1"));
        }
        Ok(())
    }

    /// Validate and fix the resolved chop step
    fn resolved(mut self) -> Result<Self> {
        self.validate()?;
        self.chop_step = ChopStep::from_options(self.step_ms, self.step_factor)?;
        Ok(self)
    }

    /// Indexed window lengths: each configured window widened by the
    /// crossfade length.
    pub fn window_scales(&self) -> Result<Vec<u32>> {
        let margin = self.crossfade_ms();
        self.windows
            .iter()
            .map(|&window| {
                window.checked_add(margin).ok_or_else(|| {
                    CollageError::config(format!(
                        "Window of {}ms plus {}ms crossfade is out of range",
                        window, margin
                    ))
                })
            })
            .collect()
    }

    pub fn target_file(&self) -> Option<&str> {
        self.target_file.as_deref()
    }

    pub fn sample_file(&self) -> Option<&str> {
        self.sample_file.as_deref()
    }

    pub fn outpath(&self) -> Option<&str> {
        self.outpath.as_deref()
    }

    pub fn windows(&self) -> &[u32] {
        &self.windows
    }

    pub fn distance_fn(&self) -> DistanceKind {
        self.distance_fn
    }

    pub fn declick_fn(&self) -> Option<DeclickShape> {
        self.declick_fn
    }

    /// Configured crossfade length. Zero when no declick shape is set.
    pub fn crossfade_ms(&self) -> u32 {
        if self.declick_fn.is_some() {
            self.declick_ms
        } else {
            0
        }
    }

    pub fn step_ms(&self) -> Option<u32> {
        self.step_ms
    }

    pub fn step_factor(&self) -> Option<f64> {
        self.step_factor
    }

    pub fn chop_step(&self) -> ChopStep {
        self.chop_step
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    pub fn compress_cache(&self) -> bool {
        self.compress_cache
    }

    /// Whether a failed cache write aborts the run
    pub fn strict_cache(&self) -> bool {
        self.strict_cache
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }
}

/// Builder for [`CollageConfig`]; `build` validates.
#[derive(Debug, Clone)]
pub struct CollageConfigBuilder {
    config: CollageConfig,
}

impl CollageConfigBuilder {
    pub fn target_file(mut self, path: impl Into<String>) -> Self {
        self.config.target_file = Some(path.into());
        self
    }

    pub fn sample_file(mut self, path: impl Into<String>) -> Self {
        self.config.sample_file = Some(path.into());
        self
    }

    pub fn outpath(mut self, path: impl Into<String>) -> Self {
        self.config.outpath = Some(path.into());
        self
    }

    pub fn windows(mut self, windows: Vec<u32>) -> Self {
        self.config.windows = windows;
        self
    }

    pub fn distance_fn(mut self, distance: DistanceKind) -> Self {
        self.config.distance_fn = distance;
        self
    }

    pub fn declick_fn(mut self, shape: Option<DeclickShape>) -> Self {
        self.config.declick_fn = shape;
        self
    }

    pub fn declick_ms(mut self, ms: u32) -> Self {
        self.config.declick_ms = ms;
        self
    }

    pub fn step_ms(mut self, step_ms: Option<u32>) -> Self {
        self.config.step_ms = step_ms;
        self
    }

    pub fn step_factor(mut self, step_factor: Option<f64>) -> Self {
        self.config.step_factor = step_factor;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// `None` disables the on-disk index cache
    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = dir;
        self
    }

    pub fn compress_cache(mut self, compress: bool) -> Self {
        self.config.compress_cache = compress;
        self
    }

    pub fn strict_cache(mut self, strict: bool) -> Self {
        self.config.strict_cache = strict;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn progress(mut self, progress: ProgressHandle) -> Self {
        self.config.progress = progress;
        self
    }

    pub fn build(self) -> Result<CollageConfig> {
        self.config.resolved()
    }
}
