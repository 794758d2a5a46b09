//! Callback system for chain lifecycle events.
//!
//! Chains emit an [`Event`] when they start, finish, or fail, and around
//! every model and retriever call. Implement [`Callback`] to observe them for
//! logging, tracing, or external telemetry; pipeline logic is unaffected.
//!
//! A chain only dispatches when it is verbose or at least one reachable
//! listener reports [`Callback::always_verbose`]. Listener failures never
//! stop delivery to the other listeners; what happens to them is governed by
//! [`ListenerErrorPolicy`].

pub mod event;
pub mod logging;
pub mod manager;
pub mod recording;
pub mod tracking;

pub use event::{Event, EventData, EventKind, RunMeta};
pub use logging::LoggingHandler;
pub use manager::{CallbackManager, ListenerErrorPolicy};
pub use recording::{RecordedEvent, RecordingHandler};
pub use tracking::{RequestTracker, TrackedRequest, TrackingHandler, TrackingOptions};

use crate::error::ChainError;
use crate::types::{Document, ModelResult};
use crate::values::ChainValues;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Listener for chain lifecycle events.
///
/// Every handler defaults to a no-op, so implementors override only the
/// events they care about. [`on_event`](Self::on_event) receives every event
/// and routes it to the per-kind handler; override it instead to handle all
/// events in one place.
///
/// Handlers run sequentially in registration order and are awaited inline,
/// so a slow listener slows the chain.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use llm_chains::callbacks::{Callback, RunMeta};
/// use llm_chains::ChainValues;
///
/// struct PrintStarts;
///
/// #[async_trait]
/// impl Callback for PrintStarts {
///     fn always_verbose(&self) -> bool {
///         true
///     }
///
///     async fn on_chain_start(
///         &self,
///         run: &RunMeta,
///         chain_type: &str,
///         _inputs: &ChainValues,
///     ) -> anyhow::Result<()> {
///         println!("[start] {} {}", chain_type, run.run_id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Callback: Send + Sync {
    /// Name used when reporting this listener's failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Receive events even from chains that are not verbose.
    fn always_verbose(&self) -> bool {
        false
    }

    /// Called for every event.
    async fn on_event(&self, event: &Event<'_>) -> anyhow::Result<()> {
        let run = &event.meta;
        match event.data {
            EventData::ChainStart { chain_type, inputs } => {
                self.on_chain_start(run, chain_type, inputs).await
            }
            EventData::ChainEnd {
                chain_type,
                outputs,
            } => self.on_chain_end(run, chain_type, outputs).await,
            EventData::ChainError { chain_type, error } => {
                self.on_chain_error(run, chain_type, error).await
            }
            EventData::ModelStart {
                model_type,
                prompts,
                invocation_params,
            } => {
                self.on_model_start(run, model_type, prompts, invocation_params)
                    .await
            }
            EventData::ModelEnd { model_type, result } => {
                self.on_model_end(run, model_type, result).await
            }
            EventData::ModelError { model_type, error } => {
                self.on_model_error(run, model_type, error).await
            }
            EventData::RetrieverStart { query } => self.on_retriever_start(run, query).await,
            EventData::RetrieverEnd { query, documents } => {
                self.on_retriever_end(run, query, documents).await
            }
            EventData::RetrieverError { query, error } => {
                self.on_retriever_error(run, query, error).await
            }
        }
    }

    async fn on_chain_start(
        &self,
        _run: &RunMeta,
        _chain_type: &str,
        _inputs: &ChainValues,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_chain_end(
        &self,
        _run: &RunMeta,
        _chain_type: &str,
        _outputs: &ChainValues,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_chain_error(
        &self,
        _run: &RunMeta,
        _chain_type: &str,
        _error: &ChainError,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_model_start(
        &self,
        _run: &RunMeta,
        _model_type: &str,
        _prompts: &[String],
        _invocation_params: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_model_end(
        &self,
        _run: &RunMeta,
        _model_type: &str,
        _result: &ModelResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_model_error(
        &self,
        _run: &RunMeta,
        _model_type: &str,
        _error: &ChainError,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_retriever_start(&self, _run: &RunMeta, _query: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_retriever_end(
        &self,
        _run: &RunMeta,
        _query: &str,
        _documents: &[Document],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_retriever_error(
        &self,
        _run: &RunMeta,
        _query: &str,
        _error: &ChainError,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A [`Callback`] backed by a closure that sees every event.
///
/// # Example
///
/// ```
/// use llm_chains::callbacks::{Event, EventKind, FnCallback};
/// use std::sync::Arc;
///
/// let handler = Arc::new(
///     FnCallback::new("printer", |event: &Event<'_>| {
///         if event.kind() == EventKind::ChainEnd {
///             println!("finished {}", event.data.label());
///         }
///         Ok(())
///     })
///     .with_always_verbose(true),
/// );
/// ```
pub struct FnCallback<F> {
    name: String,
    f: F,
    always_verbose: bool,
}

impl<F> FnCallback<F>
where
    F: Fn(&Event<'_>) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            always_verbose: false,
        }
    }

    pub fn with_always_verbose(mut self, enabled: bool) -> Self {
        self.always_verbose = enabled;
        self
    }
}

#[async_trait]
impl<F> Callback for FnCallback<F>
where
    F: Fn(&Event<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn always_verbose(&self) -> bool {
        self.always_verbose
    }

    async fn on_event(&self, event: &Event<'_>) -> anyhow::Result<()> {
        (self.f)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use uuid::Uuid;

    /// Counts per-kind calls through the default `on_event` routing.
    #[derive(Default)]
    struct Counter {
        starts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Callback for Counter {
        async fn on_chain_start(
            &self,
            _run: &RunMeta,
            chain_type: &str,
            _inputs: &ChainValues,
        ) -> anyhow::Result<()> {
            self.starts.lock().push(chain_type.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_on_event_routes_to_handler() {
        let counter = Counter::default();
        let values = ChainValues::new();
        let meta = RunMeta::new(Uuid::new_v4(), None);

        let start = Event {
            meta,
            data: EventData::ChainStart {
                chain_type: "llm-chain",
                inputs: &values,
            },
        };
        counter.on_event(&start).await.unwrap();

        let end = Event {
            meta,
            data: EventData::ChainEnd {
                chain_type: "llm-chain",
                outputs: &values,
            },
        };
        counter.on_event(&end).await.unwrap();

        assert_eq!(*counter.starts.lock(), vec!["llm-chain".to_string()]);
    }

    #[tokio::test]
    async fn test_fn_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb = FnCallback::new("fn", move |event: &Event<'_>| {
            sink.lock().push(event.kind());
            Ok(())
        });
        assert_eq!(cb.name(), "fn");
        assert!(!cb.always_verbose());

        let event = Event {
            meta: RunMeta::new(Uuid::new_v4(), None),
            data: EventData::RetrieverStart { query: "q" },
        };
        cb.on_event(&event).await.unwrap();
        assert_eq!(*seen.lock(), vec![EventKind::RetrieverStart]);
    }
}
