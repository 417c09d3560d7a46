//! Progress reporting
//!
//! Components emit [`ProgressEvent`]s into an optional [`ProgressSink`].
//! Events are purely observational: dropping them changes no result.

use std::fmt;
use std::sync::Arc;

/// Pipeline phase an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Chopping,
    Indexing,
    Selecting,
    Concatenating,
}

impl Phase {
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Chopping => "Chopping sample audio",
            Phase::Indexing => "Indexing sample audio",
            Phase::Selecting => "Selecting samples",
            Phase::Concatenating => "Concatenating samples",
        }
    }
}

/// Position of an event within its phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    Step,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub stage: Stage,
    pub current_step: usize,
    pub total_steps: Option<usize>,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn started(phase: Phase, total_steps: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            stage: Stage::Started,
            current_step: 0,
            total_steps: Some(total_steps),
            message: Some(message.into()),
        }
    }

    pub fn step(phase: Phase, current_step: usize) -> Self {
        Self {
            phase,
            stage: Stage::Step,
            current_step,
            total_steps: None,
            message: None,
        }
    }

    pub fn completed(phase: Phase, current_step: usize) -> Self {
        Self {
            phase,
            stage: Stage::Completed,
            current_step,
            total_steps: None,
            message: None,
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Optional, cheaply cloneable handle to a sink. The empty handle is a no-op.
#[derive(Clone, Default)]
pub struct ProgressHandle {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressHandle {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(&event);
        }
    }

    pub fn start(&self, phase: Phase, total_steps: usize, message: impl Into<String>) {
        if self.sink.is_some() {
            self.emit(ProgressEvent::started(phase, total_steps, message));
        }
    }

    pub fn step(&self, phase: Phase, current_step: usize) {
        self.emit(ProgressEvent::step(phase, current_step));
    }

    pub fn complete(&self, phase: Phase, current_step: usize) {
        self.emit(ProgressEvent::completed(phase, current_step));
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Collects every event; handy for tests and for callers that render later.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
