//! Distance functions between audio buffers

use crate::buffer::AudioBuffer;
use crate::error::{CollageError, Result};
use crate::features::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selects the distance function an index is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// DTW over MFCC frames
    Mfcc,
    /// Frobenius norm of the zero-padded MFCC difference
    FastMfcc,
    /// Euclidean distance between mean MFCC vectors
    MeanMfcc,
    /// Cosine distance between flattened MFCC matrices
    MfccCosine,
    /// DTW over chroma frames
    Chroma,
    /// Chroma DTW plus MFCC DTW
    MfccChroma,
    /// L1 over raw samples
    Waveform,
}

impl DistanceKind {
    pub const ALL: [DistanceKind; 7] = [
        DistanceKind::Mfcc,
        DistanceKind::FastMfcc,
        DistanceKind::MeanMfcc,
        DistanceKind::MfccCosine,
        DistanceKind::Chroma,
        DistanceKind::MfccChroma,
        DistanceKind::Waveform,
    ];

    /// Stable identifier, also used in cache file names
    pub fn name(&self) -> &'static str {
        match self {
            DistanceKind::Mfcc => "mfcc",
            DistanceKind::FastMfcc => "fast_mfcc",
            DistanceKind::MeanMfcc => "mean_mfcc",
            DistanceKind::MfccCosine => "mfcc_cosine",
            DistanceKind::Chroma => "chroma",
            DistanceKind::MfccChroma => "mfcc_chroma",
            DistanceKind::Waveform => "waveform",
        }
    }

    pub fn distance(&self, a: &AudioBuffer, b: &AudioBuffer) -> f64 {
        match self {
            DistanceKind::Mfcc => align_distance(a.mfcc(), b.mfcc()),
            DistanceKind::FastMfcc => frobenius_distance(a.mfcc(), b.mfcc()),
            DistanceKind::MeanMfcc => euclidean(a.mfcc_mean(), b.mfcc_mean()),
            DistanceKind::MfccCosine => cosine_distance(a.mfcc(), b.mfcc()),
            DistanceKind::Chroma => align_distance(a.chroma(), b.chroma()),
            DistanceKind::MfccChroma => {
                align_distance(a.chroma(), b.chroma()) + align_distance(a.mfcc(), b.mfcc())
            }
            DistanceKind::Waveform => waveform_distance(a.samples(), b.samples()),
        }
    }

    /// Compute and memoize the features this distance reads
    pub fn prepare(&self, buffer: &AudioBuffer) {
        match self {
            DistanceKind::Mfcc | DistanceKind::FastMfcc | DistanceKind::MfccCosine => {
                buffer.mfcc();
            }
            DistanceKind::MeanMfcc => {
                buffer.mfcc_mean();
            }
            DistanceKind::Chroma => {
                buffer.chroma();
            }
            DistanceKind::MfccChroma => {
                buffer.mfcc();
                buffer.chroma();
            }
            DistanceKind::Waveform => {}
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceKind {
    type Err = CollageError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        DistanceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = DistanceKind::ALL.iter().map(|k| k.name()).collect();
                CollageError::config(format!(
                    "Unknown distance function '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// Dynamic time warping cost between two feature sequences.
///
/// L1 local cost; returns the accumulated cost at the final cell. An empty
/// matrix aligns as a single all-zero frame.
pub fn align_distance(a: &FeatureMatrix, b: &FeatureMatrix) -> f64 {
    let zero_a = [vec![0.0f32; a.coefficients]];
    let zero_b = [vec![0.0f32; b.coefficients]];
    let xs: &[Vec<f32>] = if a.frames.is_empty() { &zero_a } else { &a.frames };
    let ys: &[Vec<f32>] = if b.frames.is_empty() { &zero_b } else { &b.frames };

    let m = ys.len();
    let mut prev = vec![f64::INFINITY; m];
    let mut curr = vec![f64::INFINITY; m];

    for (i, x) in xs.iter().enumerate() {
        for (j, y) in ys.iter().enumerate() {
            let cost = l1(x, y);
            let best = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => curr[j - 1],
                (_, 0) => prev[j],
                _ => prev[j].min(curr[j - 1]).min(prev[j - 1]),
            };
            curr[j] = cost + best;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m - 1]
}

/// L1 distance between two frames; a missing coefficient counts as zero
fn l1(x: &[f32], y: &[f32]) -> f64 {
    let n = x.len().max(y.len());
    (0..n)
        .map(|k| {
            let a = x.get(k).copied().unwrap_or(0.0);
            let b = y.get(k).copied().unwrap_or(0.0);
            (a - b).abs() as f64
        })
        .sum()
}

/// Both matrices flattened time-major after zero-padding to a common shape
fn padded_pair(a: &FeatureMatrix, b: &FeatureMatrix) -> (Vec<f32>, Vec<f32>) {
    let frames = a.num_frames().max(b.num_frames());
    let coefficients = a.coefficients.max(b.coefficients);
    let flatten = |m: &FeatureMatrix| {
        let mut out = vec![0.0f32; frames * coefficients];
        for (t, frame) in m.frames.iter().enumerate() {
            for (c, v) in frame.iter().enumerate() {
                out[t * coefficients + c] = *v;
            }
        }
        out
    };
    (flatten(a), flatten(b))
}

fn frobenius_distance(a: &FeatureMatrix, b: &FeatureMatrix) -> f64 {
    let (x, y) = padded_pair(a, b);
    euclidean(&x, &y)
}

fn cosine_distance(a: &FeatureMatrix, b: &FeatureMatrix) -> f64 {
    let (x, y) = padded_pair(a, b);
    let dot: f64 = x.iter().zip(&y).map(|(p, q)| *p as f64 * *q as f64).sum();
    let norm_x = x.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
    let norm_y = y.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
    match (norm_x == 0.0, norm_y == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        _ => (1.0 - dot / (norm_x * norm_y)).max(0.0),
    }
}

fn euclidean(x: &[f32], y: &[f32]) -> f64 {
    let n = x.len().max(y.len());
    (0..n)
        .map(|k| {
            let a = x.get(k).copied().unwrap_or(0.0) as f64;
            let b = y.get(k).copied().unwrap_or(0.0) as f64;
            (a - b).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

fn waveform_distance(x: &[f32], y: &[f32]) -> f64 {
    l1(x, y)
}
