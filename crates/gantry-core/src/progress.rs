//! Progress and diagnostic events.
//!
//! The orchestrator reports structured events through an injected sink
//! rather than logging directly, so consumers choose the transport. The
//! production sink forwards to `tracing`; tests record events for
//! inspection. Events within a phase may interleave; only the phase
//! begin/end markers are ordered.

use std::sync::Mutex;

/// A structured event emitted during planning and bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Informational line.
    Info(String),
    /// A diagnostic warning with a stable code.
    Warning {
        code: &'static str,
        message: String,
    },
    /// A phase began.
    PhaseStarted { phase: &'static str },
    /// A phase finished successfully.
    PhaseFinished { phase: &'static str },
    /// Work units were queued for a phase.
    WorkAdded { phase: &'static str, count: usize },
    /// A single work unit finished.
    WorkCompleted {
        phase: &'static str,
        unit: String,
    },
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Info(message) => tracing::info!("{message}"),
            ProgressEvent::Warning { code, message } => tracing::warn!(code, "{message}"),
            ProgressEvent::PhaseStarted { phase } => tracing::debug!(phase, "phase started"),
            ProgressEvent::PhaseFinished { phase } => tracing::debug!(phase, "phase finished"),
            ProgressEvent::WorkAdded { phase, count } => {
                tracing::debug!(phase, count, "work queued");
            }
            ProgressEvent::WorkCompleted { phase, unit } => {
                tracing::debug!(phase, unit, "work completed");
            }
        }
    }
}

/// Records events for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        sink.emit(ProgressEvent::PhaseStarted { phase: "install" });
        sink.emit(ProgressEvent::Info("hello".to_string()));
        sink.emit(ProgressEvent::PhaseFinished { phase: "install" });

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ProgressEvent::PhaseStarted { phase: "install" });
        assert_eq!(events[2], ProgressEvent::PhaseFinished { phase: "install" });
    }
}
