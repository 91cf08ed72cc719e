//! Observer implementations: tracing output and an in-memory recorder.

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::domain::SystemEvent;
use crate::ports::SystemObserver;

/// Writes every event to the `tracing` pipeline.
///
/// Failures are warnings; dead-lettering is an expected outcome of the retry
/// budget and is logged at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SystemObserver for TracingObserver {
    fn notify(&self, event: SystemEvent) {
        let item = event.item().map(|item| item.to_string());
        match &event {
            SystemEvent::MessageDeadLettered { envelope_id, .. } => info!(
                event = event.kind(),
                queue = event.queue(),
                item = item.as_deref(),
                %envelope_id,
                "{event}"
            ),
            _ => warn!(
                event = event.kind(),
                queue = event.queue(),
                item = item.as_deref(),
                "{event}"
            ),
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SystemEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SystemEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events with the given `SystemEvent::kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

impl SystemObserver for RecordingObserver {
    fn notify(&self, event: SystemEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
