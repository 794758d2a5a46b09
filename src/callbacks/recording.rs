//! A listener that keeps an in-memory log of every event.

use super::{Callback, Event, EventKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use uuid::Uuid;

/// One entry in a [`RecordingHandler`] log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub run_id: Uuid,
    pub parent_run_id: Option<Uuid>,
    /// Chain type, model type, or retriever query.
    pub label: String,
}

impl fmt::Display for RecordedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.label)
    }
}

/// Records `(kind, run id, parent run id, label)` for each event, in order.
///
/// Always verbose by default, so it sees every chain regardless of the
/// chain's own verbosity. Handy in tests and when debugging a pipeline.
#[derive(Debug)]
pub struct RecordingHandler {
    events: Mutex<Vec<RecordedEvent>>,
    always_verbose: bool,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHandler {
    /// A recorder that receives events from every chain.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            always_verbose: true,
        }
    }

    /// A recorder that only receives events from verbose chains.
    pub fn quiet() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            always_verbose: false,
        }
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Events rendered as `kind(label)` strings.
    pub fn trace(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.to_string()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl Callback for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    fn always_verbose(&self) -> bool {
        self.always_verbose
    }

    async fn on_event(&self, event: &Event<'_>) -> anyhow::Result<()> {
        self.events.lock().push(RecordedEvent {
            kind: event.kind(),
            run_id: event.meta.run_id,
            parent_run_id: event.meta.parent_run_id,
            label: event.data.label().to_string(),
        });
        Ok(())
    }
}
