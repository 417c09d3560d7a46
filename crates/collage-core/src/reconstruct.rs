//! Concatenation of selected snippets with crossfades

use crate::buffer::AudioBuffer;
use crate::config::ms_to_frames;
use crate::declick::{fade_in, fade_out, DeclickShape};
use crate::error::{CollageError, Result};
use crate::progress::{Phase, ProgressHandle};

/// Join `snippets` into one buffer at `sample_rate`.
///
/// With a shape and a non-zero `crossfade_ms`, each join overlaps by the
/// crossfade length: the tail of the output so far is faded out, the head of
/// the next snippet faded in, and the two are summed. Without a shape the
/// snippets are appended as-is. Every snippet must already be at
/// `sample_rate`.
pub fn concatenate(
    snippets: &[AudioBuffer],
    crossfade_ms: u32,
    shape: Option<DeclickShape>,
    sample_rate: u32,
    progress: &ProgressHandle,
) -> Result<AudioBuffer> {
    if snippets.is_empty() {
        return Ok(AudioBuffer::empty(sample_rate));
    }
    if let Some(bad) = snippets.iter().find(|s| s.sample_rate() != sample_rate) {
        return Err(CollageError::SampleRateMismatch {
            expected: sample_rate,
            actual: bad.sample_rate(),
        });
    }

    let total = snippets.len();
    progress.start(
        Phase::Concatenating,
        total,
        format!("Concatenating {} audio segments", total),
    );

    let overlap = match shape {
        Some(_) => ms_to_frames(crossfade_ms, sample_rate),
        None => 0,
    };

    let capacity: usize = snippets.iter().map(|s| s.len()).sum();
    let mut output: Vec<f32> = Vec::with_capacity(capacity);

    for (i, snippet) in snippets.iter().enumerate() {
        progress.step(Phase::Concatenating, i);
        let samples = snippet.samples();

        let c = overlap.min(output.len()).min(samples.len());
        match shape {
            Some(shape) if i > 0 && c > 0 => {
                let tail_start = output.len() - c;
                let out_curve = fade_out(c, shape);
                let in_curve = fade_in(c, shape);
                for k in 0..c {
                    let tail = output[tail_start + k] * out_curve[k];
                    output[tail_start + k] = tail + samples[k] * in_curve[k];
                }
                output.extend_from_slice(&samples[c..]);
            }
            _ => output.extend_from_slice(samples),
        }
    }

    progress.complete(Phase::Concatenating, total);
    log::debug!(
        "Concatenated {} snippets into {} frames ({} frame crossfades)",
        total,
        output.len(),
        overlap
    );
    Ok(AudioBuffer::new(output, sample_rate))
}
