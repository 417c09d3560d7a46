//! Spectral features: MFCC and chroma
//!
//! Short-time power spectrum via FFT (Hann window, centered frames), then
//! either a mel filterbank + log + DCT (MFCC) or a fold onto the twelve
//! pitch classes (chroma).

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock};

/// Time-major feature matrix: `frames[t][c]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Number of coefficients per frame
    pub coefficients: usize,
    pub frames: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn new(coefficients: usize, frames: Vec<Vec<f32>>) -> Self {
        Self {
            coefficients,
            frames,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Per-coefficient mean over time
    pub fn mean(&self) -> Vec<f32> {
        let mut mean = vec![0.0f32; self.coefficients];
        if self.frames.is_empty() {
            return mean;
        }
        for frame in &self.frames {
            for (m, v) in mean.iter_mut().zip(frame) {
                *m += v;
            }
        }
        let n = self.frames.len() as f32;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }
}

/// Feature extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub n_mfcc: usize,
    pub n_mels: usize,
    /// Upper bound on the FFT size; shorter inputs use their own length
    pub max_fft: usize,
    pub hop_length: usize,
    pub n_chroma: usize,
    pub top_db: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 20,
            n_mels: 128,
            max_fft: 2048,
            hop_length: 512,
            n_chroma: 12,
            top_db: 80.0,
        }
    }
}

/// MFCC and chroma extraction.
///
/// FFT plans, windows, mel filterbanks and pitch-class maps are built once
/// per FFT size and sample rate, then reused. Clones share those tables.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    tables: Arc<Tables>,
}

/// Extractor with the default configuration shared by every buffer
pub fn shared_extractor() -> &'static FeatureExtractor {
    static SHARED: OnceLock<FeatureExtractor> = OnceLock::new();
    SHARED.get_or_init(FeatureExtractor::default)
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            tables: Arc::default(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn mfcc(&self, samples: &[f32], sample_rate: u32) -> FeatureMatrix {
        let n_mfcc = self.config.n_mfcc;
        let Some(power) = self.power_spectrogram(samples) else {
            return FeatureMatrix::new(n_mfcc, Vec::new());
        };

        let n_fft = fft_size(samples.len(), self.config.max_fft);
        let filters = self.mel_filters(sample_rate, n_fft);

        let mut log_mel: Vec<Vec<f32>> = power
            .iter()
            .map(|spectrum| {
                filters
                    .iter()
                    .map(|filter| {
                        let energy: f32 = filter.iter().zip(spectrum).map(|(w, p)| w * p).sum();
                        10.0 * energy.max(1e-10).log10()
                    })
                    .collect()
            })
            .collect();

        // Clamp the dynamic range relative to the loudest cell
        let peak = log_mel
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - self.config.top_db;
        for frame in log_mel.iter_mut() {
            frame.iter_mut().for_each(|v| *v = v.max(floor));
        }

        let frames = log_mel.iter().map(|frame| dct_ortho(frame, n_mfcc)).collect();
        FeatureMatrix::new(n_mfcc, frames)
    }

    pub fn chroma(&self, samples: &[f32], sample_rate: u32) -> FeatureMatrix {
        let n_chroma = self.config.n_chroma;
        let Some(power) = self.power_spectrogram(samples) else {
            return FeatureMatrix::new(n_chroma, Vec::new());
        };

        let n_fft = fft_size(samples.len(), self.config.max_fft);
        let classes = cached(&self.tables.chroma, (sample_rate, n_fft), || {
            pitch_classes(sample_rate, n_fft, n_chroma)
        });

        let frames = power
            .iter()
            .map(|spectrum| {
                let mut frame = vec![0.0f32; n_chroma];
                for (p, class) in spectrum.iter().zip(classes.iter()) {
                    if let Some(c) = class {
                        frame[*c] += p;
                    }
                }
                let max = frame.iter().copied().fold(0.0f32, f32::max);
                if max > 0.0 {
                    frame.iter_mut().for_each(|v| *v /= max);
                }
                frame
            })
            .collect();
        FeatureMatrix::new(n_chroma, frames)
    }

    /// Power spectrum per centered frame, `n_fft / 2 + 1` bins each.
    /// `None` for empty input.
    fn power_spectrogram(&self, samples: &[f32]) -> Option<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return None;
        }
        let n_fft = fft_size(samples.len(), self.config.max_fft);
        let hop = self.config.hop_length.max(1);
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let num_frames = 1 + (padded.len() - n_fft) / hop;
        let num_bins = n_fft / 2 + 1;

        let fft = self.fft(n_fft);
        let window = cached(&self.tables.windows, n_fft, || hann_window(n_fft));

        let mut spectra = Vec::with_capacity(num_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        for frame_idx in 0..num_frames {
            let start = frame_idx * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            spectra.push(buffer[..num_bins].iter().map(|c| c.norm_sqr()).collect());
        }
        Some(spectra)
    }

    /// Mel filterbank for `(sample_rate, n_fft)`, built on first use
    pub fn mel_filters(&self, sample_rate: u32, n_fft: usize) -> Arc<Vec<Vec<f32>>> {
        cached(&self.tables.mel, (sample_rate, n_fft), || {
            mel_filterbank(sample_rate, n_fft, self.config.n_mels)
        })
    }

    fn fft(&self, n_fft: usize) -> Arc<dyn Fft<f32>> {
        if let Ok(plans) = self.tables.ffts.lock() {
            if let Some(plan) = plans.get(&n_fft) {
                return Arc::clone(plan);
            }
        }
        let plan = FftPlanner::new().plan_fft_forward(n_fft);
        match self.tables.ffts.lock() {
            Ok(mut plans) => Arc::clone(plans.entry(n_fft).or_insert(plan)),
            Err(_) => plan,
        }
    }
}

/// Per-extractor lookup tables
#[derive(Default)]
struct Tables {
    ffts: Mutex<HashMap<usize, Arc<dyn Fft<f32>>>>,
    windows: Mutex<HashMap<usize, Arc<Vec<f32>>>>,
    mel: Mutex<HashMap<(u32, usize), Arc<Vec<Vec<f32>>>>>,
    chroma: Mutex<HashMap<(u32, usize), Arc<Vec<Option<usize>>>>>,
}

impl fmt::Debug for Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tables").finish_non_exhaustive()
    }
}

/// Fetch `key` from `table`, building it with `make` on a miss. A poisoned
/// lock only costs a rebuild.
fn cached<K, V>(table: &Mutex<HashMap<K, Arc<V>>>, key: K, make: impl FnOnce() -> V) -> Arc<V>
where
    K: Hash + Eq,
{
    if let Ok(map) = table.lock() {
        if let Some(value) = map.get(&key) {
            return Arc::clone(value);
        }
    }
    // Built outside the lock; concurrent misses keep the first insert
    let value = Arc::new(make());
    match table.lock() {
        Ok(mut map) => Arc::clone(map.entry(key).or_insert(value)),
        Err(_) => value,
    }
}

fn fft_size(len: usize, max_fft: usize) -> usize {
    len.min(max_fft).max(1)
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

const MEL_F_SP: f32 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f32 = 1000.0;
const MEL_MIN_LOG_MEL: f32 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f32 {
    6.4f32.ln() / 27.0
}

fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        mel * MEL_F_SP
    }
}

/// Triangular mel filters with area normalisation, `[n_mels][n_fft/2 + 1]`
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let num_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let bin_freqs: Vec<f32> = (0..num_bins)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);
            bin_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lo) / (center - lo);
                    let falling = (hi - f) / (hi - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II, first `n_out` coefficients
fn dct_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len() as f32;
    (0..n_out)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI / n * (i as f32 + 0.5) * k as f32).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// Pitch class of each FFT bin (A440 reference, C = 0). DC maps to nothing.
fn pitch_classes(sample_rate: u32, n_fft: usize, n_chroma: usize) -> Vec<Option<usize>> {
    let num_bins = n_fft / 2 + 1;
    let per_octave = n_chroma as f32;
    (0..num_bins)
        .map(|k| {
            if k == 0 {
                return None;
            }
            let freq = k as f32 * sample_rate as f32 / n_fft as f32;
            let pitch = per_octave * (freq / 440.0).log2() + per_octave * 9.0 / 12.0;
            let class = pitch.round().rem_euclid(per_octave) as usize;
            Some(class.min(n_chroma - 1))
        })
        .collect()
}
