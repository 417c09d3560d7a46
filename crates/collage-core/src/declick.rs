//! Fade curves applied at snippet joins

use crate::error::{CollageError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Steepness of the logistic fade
const SIGMOID_STEEPNESS: f32 = 15.0;

/// Shape of the fade curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclickShape {
    Linear,
    Sigmoid,
}

impl DeclickShape {
    pub fn name(&self) -> &'static str {
        match self {
            DeclickShape::Linear => "linear",
            DeclickShape::Sigmoid => "sigmoid",
        }
    }

    /// Crossfade length used when a shape is chosen without an explicit length
    pub fn default_crossfade_ms(&self) -> u32 {
        match self {
            DeclickShape::Sigmoid => 20,
            DeclickShape::Linear => 70,
        }
    }

    /// Weight at normalized position `x` in [0, 1]
    fn weight(&self, x: f32) -> f32 {
        match self {
            DeclickShape::Linear => x,
            DeclickShape::Sigmoid => 1.0 / (1.0 + (-(x - 0.5) * SIGMOID_STEEPNESS).exp()),
        }
    }
}

impl fmt::Display for DeclickShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeclickShape {
    type Err = CollageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(DeclickShape::Linear),
            "sigmoid" => Ok(DeclickShape::Sigmoid),
            other => Err(CollageError::config(format!(
                "Unknown declick function '{}' (expected 'linear' or 'sigmoid')",
                other
            ))),
        }
    }
}

/// Fade-in weights, rising from 0 to 1 over `n` frames.
///
/// A single frame gets full weight.
pub fn fade_in(n: usize, shape: DeclickShape) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (n - 1) as f32;
            (0..n).map(|i| shape.weight(i as f32 / denom)).collect()
        }
    }
}

/// Fade-out weights: the reverse of [`fade_in`]
pub fn fade_out(n: usize, shape: DeclickShape) -> Vec<f32> {
    let mut curve = fade_in(n, shape);
    curve.reverse();
    curve
}

/// Multiply the first `n` samples by the fade-in curve, returning a new vector.
/// `n` is clamped to the input length.
pub fn declick_in(samples: &[f32], n: usize, shape: DeclickShape) -> Vec<f32> {
    let mut out = samples.to_vec();
    declick_in_place(&mut out, n, shape);
    out
}

/// Multiply the last `n` samples by the fade-out curve, returning a new vector
pub fn declick_out(samples: &[f32], n: usize, shape: DeclickShape) -> Vec<f32> {
    let mut out = samples.to_vec();
    declick_out_place(&mut out, n, shape);
    out
}

pub fn declick_in_place(samples: &mut [f32], n: usize, shape: DeclickShape) {
    let n = n.min(samples.len());
    for (s, w) in samples[..n].iter_mut().zip(fade_in(n, shape)) {
        *s *= w;
    }
}

pub fn declick_out_place(samples: &mut [f32], n: usize, shape: DeclickShape) {
    let n = n.min(samples.len());
    let start = samples.len() - n;
    for (s, w) in samples[start..].iter_mut().zip(fade_out(n, shape)) {
        *s *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_fade_in_values() {
        let out = declick_in(&[2.0; 8], 5, DeclickShape::Linear);
        let expected = [0.0, 0.5, 1.0, 1.5, 2.0, 2.0, 2.0, 2.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_linear_fade_out_values() {
        let out = declick_out(&[2.0; 8], 5, DeclickShape::Linear);
        let expected = [2.0, 2.0, 2.0, 2.0, 1.5, 1.0, 0.5, 0.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_curves_are_reverses() {
        for shape in [DeclickShape::Linear, DeclickShape::Sigmoid] {
            let mut up = fade_in(33, shape);
            let down = fade_out(33, shape);
            up.reverse();
            assert_eq!(up, down);
        }
    }

    #[test]
    fn test_linear_endpoints() {
        let curve = fade_in(10, DeclickShape::Linear);
        assert_eq!(curve.len(), 10);
        assert_eq!(curve[0], 0.0);
        assert_eq!(curve[9], 1.0);
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sigmoid_shape() {
        let curve = fade_in(101, DeclickShape::Sigmoid);
        assert!(curve[0] < 0.001);
        assert!(curve[100] > 0.999);
        assert_abs_diff_eq!(curve[50], 0.5, epsilon = 1e-6);
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(fade_in(0, DeclickShape::Linear).is_empty());
        assert_eq!(fade_in(1, DeclickShape::Sigmoid), vec![1.0]);
        // Longer than the input: whole input is faded
        let out = declick_in(&[1.0, 1.0], 10, DeclickShape::Linear);
        assert_eq!(out, vec![0.0, 1.0]);
    }

    #[test]
    fn test_copy_leaves_input_untouched() {
        let input = vec![1.0f32; 4];
        let _ = declick_out(&input, 4, DeclickShape::Sigmoid);
        assert_eq!(input, vec![1.0; 4]);

        let mut buf = vec![1.0f32; 4];
        declick_in_place(&mut buf, 4, DeclickShape::Linear);
        assert_eq!(buf[0], 0.0);
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!("Sigmoid".parse::<DeclickShape>().unwrap(), DeclickShape::Sigmoid);
        assert_eq!("linear".parse::<DeclickShape>().unwrap(), DeclickShape::Linear);
        assert!("cubic".parse::<DeclickShape>().is_err());
        assert_eq!(DeclickShape::Linear.default_crossfade_ms(), 70);
    }
}
