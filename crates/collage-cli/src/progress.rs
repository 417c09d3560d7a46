//! Progress rendering through the `log` facade

use collage_core::{Phase, ProgressEvent, ProgressSink, Stage};
use std::collections::HashMap;
use std::sync::Mutex;

/// Logs phase start/completion at info level and every 10% at debug
#[derive(Debug, Default)]
pub struct LogProgress {
    /// (total steps, last reported decile) per phase
    state: Mutex<HashMap<Phase, (usize, usize)>>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// New decile reached by `current`, if any
    fn advance(&self, phase: Phase, current: usize) -> Option<usize> {
        let mut state = self.state.lock().ok()?;
        let (total, last) = state.get_mut(&phase)?;
        if *total == 0 {
            return None;
        }
        let decile = (current.min(*total) * 10) / *total;
        if decile > *last {
            *last = decile;
            Some(decile * 10)
        } else {
            None
        }
    }
}

impl ProgressSink for LogProgress {
    fn on_event(&self, event: &ProgressEvent) {
        let phase = event.phase;
        match event.stage {
            Stage::Started => {
                if let Ok(mut state) = self.state.lock() {
                    state.insert(phase, (event.total_steps.unwrap_or(0), 0));
                }
                match &event.message {
                    Some(msg) => log::info!("{}: {}", phase.description(), msg),
                    None => log::info!("{}", phase.description()),
                }
            }
            Stage::Step => {
                if let Some(percent) = self.advance(phase, event.current_step) {
                    log::debug!("{}: {}%", phase.description(), percent);
                }
            }
            Stage::Completed => {
                log::info!("{}: done", phase.description());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_decile_once() {
        let sink = LogProgress::new();
        sink.on_event(&ProgressEvent::started(Phase::Selecting, 100, "scan"));

        assert_eq!(sink.advance(Phase::Selecting, 5), None);
        assert_eq!(sink.advance(Phase::Selecting, 12), Some(10));
        assert_eq!(sink.advance(Phase::Selecting, 15), None);
        assert_eq!(sink.advance(Phase::Selecting, 47), Some(40));
        assert_eq!(sink.advance(Phase::Selecting, 500), Some(100));
    }

    #[test]
    fn test_step_without_start_is_ignored() {
        let sink = LogProgress::new();
        assert_eq!(sink.advance(Phase::Indexing, 3), None);
        sink.on_event(&ProgressEvent::step(Phase::Indexing, 3));
    }
}
