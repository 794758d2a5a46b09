//! Lifecycle event records.

use crate::error::ChainError;
use crate::types::{Document, ModelResult};
use crate::values::ChainValues;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Correlation header carried by every event.
///
/// `run_id` pairs a start event with its end or error event. `parent_run_id`
/// is the run of the enclosing chain, so a listener can rebuild the call
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub parent_run_id: Option<Uuid>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl RunMeta {
    /// Stamp a new event for `run_id` with the current time.
    pub fn new(run_id: Uuid, parent_run_id: Option<Uuid>) -> Self {
        Self {
            run_id,
            parent_run_id,
            timestamp: Utc::now(),
        }
    }
}

/// Payload-free discriminant of an [`EventData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChainStart,
    ChainEnd,
    ChainError,
    ModelStart,
    ModelEnd,
    ModelError,
    RetrieverStart,
    RetrieverEnd,
    RetrieverError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChainStart => "chain-start",
            EventKind::ChainEnd => "chain-end",
            EventKind::ChainError => "chain-error",
            EventKind::ModelStart => "model-start",
            EventKind::ModelEnd => "model-end",
            EventKind::ModelError => "model-error",
            EventKind::RetrieverStart => "retriever-start",
            EventKind::RetrieverEnd => "retriever-end",
            EventKind::RetrieverError => "retriever-error",
        }
    }

    /// Whether this kind opens a run.
    pub fn is_start(&self) -> bool {
        matches!(
            self,
            EventKind::ChainStart | EventKind::ModelStart | EventKind::RetrieverStart
        )
    }

    /// Whether this kind closes a run (end or error).
    pub fn is_terminal(&self) -> bool {
        !self.is_start()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an [`Event`].
///
/// Payloads borrow from the emitting chain; listeners that keep data must
/// clone it.
#[derive(Debug, Clone, Copy)]
pub enum EventData<'a> {
    ChainStart {
        chain_type: &'a str,
        inputs: &'a ChainValues,
    },
    ChainEnd {
        chain_type: &'a str,
        outputs: &'a ChainValues,
    },
    ChainError {
        chain_type: &'a str,
        error: &'a ChainError,
    },
    ModelStart {
        model_type: &'a str,
        prompts: &'a [String],
        invocation_params: &'a Map<String, Value>,
    },
    ModelEnd {
        model_type: &'a str,
        result: &'a ModelResult,
    },
    ModelError {
        model_type: &'a str,
        error: &'a ChainError,
    },
    RetrieverStart {
        query: &'a str,
    },
    RetrieverEnd {
        query: &'a str,
        documents: &'a [Document],
    },
    RetrieverError {
        query: &'a str,
        error: &'a ChainError,
    },
}

impl<'a> EventData<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::ChainStart { .. } => EventKind::ChainStart,
            EventData::ChainEnd { .. } => EventKind::ChainEnd,
            EventData::ChainError { .. } => EventKind::ChainError,
            EventData::ModelStart { .. } => EventKind::ModelStart,
            EventData::ModelEnd { .. } => EventKind::ModelEnd,
            EventData::ModelError { .. } => EventKind::ModelError,
            EventData::RetrieverStart { .. } => EventKind::RetrieverStart,
            EventData::RetrieverEnd { .. } => EventKind::RetrieverEnd,
            EventData::RetrieverError { .. } => EventKind::RetrieverError,
        }
    }

    /// Short label: the chain type, model type, or retriever query.
    pub fn label(&self) -> &'a str {
        match *self {
            EventData::ChainStart { chain_type, .. }
            | EventData::ChainEnd { chain_type, .. }
            | EventData::ChainError { chain_type, .. } => chain_type,
            EventData::ModelStart { model_type, .. }
            | EventData::ModelEnd { model_type, .. }
            | EventData::ModelError { model_type, .. } => model_type,
            EventData::RetrieverStart { query }
            | EventData::RetrieverEnd { query, .. }
            | EventData::RetrieverError { query, .. } => query,
        }
    }
}

/// A lifecycle event delivered to [`Callback`](super::Callback) listeners.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub meta: RunMeta,
    pub data: EventData<'a>,
}

impl<'a> Event<'a> {
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }
}
