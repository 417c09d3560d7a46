//! Windowed chopping of a buffer into snippets

use crate::buffer::AudioBuffer;
use crate::config::{ms_to_frames, ChopStep};
use crate::progress::{Phase, ProgressHandle};

/// Cut `buffer` into consecutive `window_ms` snippets.
///
/// Slices advance by `step`; a trailing partial window is dropped, never
/// padded. Each snippet records its start frame as its offset.
pub fn chop(
    buffer: &AudioBuffer,
    window_ms: u32,
    step: ChopStep,
    progress: &ProgressHandle,
) -> Vec<AudioBuffer> {
    let sample_rate = buffer.sample_rate();
    let frames = ms_to_frames(window_ms, sample_rate);
    let step_frames = step.frames(window_ms, sample_rate).max(1);
    let total = buffer.len();

    if frames == 0 || total < frames {
        log::debug!(
            "{}ms window ({} frames) does not fit into {} frames",
            window_ms,
            frames,
            total
        );
        return Vec::new();
    }

    progress.start(
        Phase::Chopping,
        total,
        format!("Chopping {}ms window", window_ms),
    );

    let count = (total - frames) / step_frames + 1;
    let mut snippets = Vec::with_capacity(count);
    let mut start = 0;
    while start + frames <= total {
        snippets.push(buffer.slice(start, start + frames));
        progress.step(Phase::Chopping, start + frames);
        start += step_frames;
    }

    progress.complete(Phase::Chopping, total);
    log::debug!(
        "Chopped {} snippets of {}ms (step {} frames)",
        snippets.len(),
        window_ms,
        step_frames
    );
    snippets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RecordingSink, Stage};
    use std::sync::Arc;

    fn ramp(len: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::new((0..len).map(|i| i as f32).collect(), rate)
    }

    #[test]
    fn test_non_overlapping() {
        let snippets = chop(&ramp(100, 100), 500, ChopStep::Window, &ProgressHandle::none());
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].len(), 50);
        assert_eq!(snippets[1].offset_frames(), Some(50));
        assert_eq!(snippets[1].samples()[0], 50.0);
    }

    #[test]
    fn test_fixed_step() {
        let snippets = chop(&ramp(100, 100), 500, ChopStep::Fixed(250), &ProgressHandle::none());
        assert_eq!(snippets.len(), 3);
        let offsets: Vec<_> = snippets.iter().map(|s| s.offset_frames().unwrap()).collect();
        assert_eq!(offsets, vec![0, 25, 50]);
    }

    #[test]
    fn test_ratio_step() {
        let snippets = chop(&ramp(50, 100), 200, ChopStep::Ratio(0.5), &ProgressHandle::none());
        assert_eq!(snippets.len(), 4);
        assert!(snippets.iter().all(|s| s.len() == 20));
    }

    #[test]
    fn test_slice_count_formula() {
        for (n, window_ms, step) in [(1000, 100, 30), (999, 250, 250), (77, 10, 1)] {
            let snippets = chop(&ramp(n, 1000), window_ms, ChopStep::Fixed(step), &ProgressHandle::none());
            let frames = window_ms as usize;
            assert_eq!(snippets.len(), (n - frames) / step as usize + 1);
            for pair in snippets.windows(2) {
                let gap = pair[1].offset_frames().unwrap() - pair[0].offset_frames().unwrap();
                assert_eq!(gap, step as usize);
            }
        }
    }

    #[test]
    fn test_too_short_input() {
        assert!(chop(&ramp(10, 100), 500, ChopStep::Window, &ProgressHandle::none()).is_empty());
        // Window rounds down to zero frames
        assert!(chop(&ramp(10, 100), 5, ChopStep::Window, &ProgressHandle::none()).is_empty());
    }

    #[test]
    fn test_progress_events() {
        let recorder = Arc::new(RecordingSink::new());
        let handle = ProgressHandle::new(recorder.clone());
        chop(&ramp(100, 100), 500, ChopStep::Window, &handle);

        let events = recorder.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].stage, Stage::Started);
        assert_eq!(events[0].total_steps, Some(100));
        assert_eq!(events[0].message.as_deref(), Some("Chopping 500ms window"));
        assert_eq!(events[1].current_step, 50);
        assert_eq!(events[2].current_step, 100);
        assert_eq!(events[3].stage, Stage::Completed);
    }
}
