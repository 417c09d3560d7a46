//! Linear-interpolation resampling

/// Resample mono `samples` from `from_rate` to `to_rate`
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(&next) => samples[idx] + (next - samples[idx]) * frac,
                None => samples[idx],
            }
        })
        .collect()
}
