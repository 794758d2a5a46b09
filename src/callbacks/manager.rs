//! Fan-out of lifecycle events to registered listeners.

use super::{Callback, Event, EventData, RunMeta};
use crate::error::ListenerError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do with errors returned by callback listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerErrorPolicy {
    /// Log each listener error with `tracing::warn!` and discard it.
    #[default]
    LogAndDrop,
    /// Gather listener errors for the whole invocation tree. A top-level
    /// call that otherwise succeeded returns
    /// [`ChainError::Listener`](crate::ChainError::Listener) carrying both
    /// the errors and the real result.
    Collect,
}

type ErrorSink = Arc<Mutex<Vec<ListenerError>>>;

/// Delivers events to an ordered list of listeners.
///
/// One manager is bound to each chain invocation. It holds the listeners
/// inherited from the caller plus the chain's own, and whether the chain is
/// active (verbose, or some listener is always verbose). Inactive managers
/// drop every event.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn Callback>>,
    active: bool,
    policy: ListenerErrorPolicy,
    sink: Option<ErrorSink>,
}

impl CallbackManager {
    /// Create a manager. It is active if any handler is always verbose.
    pub fn new(handlers: Vec<Arc<dyn Callback>>, policy: ListenerErrorPolicy) -> Self {
        let active = handlers.iter().any(|h| h.always_verbose());
        Self {
            handlers,
            active,
            policy,
            sink: None,
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn Callback>] {
        &self.handlers
    }

    /// Whether events are delivered at all.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn policy(&self) -> ListenerErrorPolicy {
        self.policy
    }

    /// Manager for a chain run: inherited listeners followed by `own`.
    ///
    /// The listener error sink is shared with the parent run, or created
    /// fresh for a top-level run.
    pub(crate) fn for_run(&self, own: &[Arc<dyn Callback>], verbose: bool) -> Self {
        let handlers: Vec<Arc<dyn Callback>> =
            self.handlers.iter().chain(own.iter()).cloned().collect();
        let active = verbose || handlers.iter().any(|h| h.always_verbose());
        Self {
            handlers,
            active,
            policy: self.policy,
            sink: Some(self.sink.clone().unwrap_or_default()),
        }
    }

    /// Deliver one event to every listener, in registration order.
    ///
    /// A failing listener does not prevent delivery to the rest.
    pub async fn notify(&self, meta: RunMeta, data: EventData<'_>) {
        if !self.active {
            return;
        }
        let event = Event { meta, data };
        for handler in &self.handlers {
            if let Err(err) = handler.on_event(&event).await {
                self.report(ListenerError {
                    listener: handler.name().to_string(),
                    event: data.kind(),
                    source: err.into(),
                });
            }
        }
    }

    fn report(&self, err: ListenerError) {
        match (&self.sink, self.policy) {
            (Some(sink), ListenerErrorPolicy::Collect) => {
                debug!(listener = %err.listener, event = %err.event, "Collected callback listener error");
                sink.lock().push(err);
            }
            _ => Self::log_dropped(&err),
        }
    }

    fn log_dropped(err: &ListenerError) {
        warn!(
            listener = %err.listener,
            event = %err.event,
            "Dropping callback listener error: {}",
            err.source
        );
    }

    /// Drain collected listener errors.
    pub(crate) fn take_errors(&self) -> Vec<ListenerError> {
        self.sink
            .as_ref()
            .map(|sink| std::mem::take(&mut *sink.lock()))
            .unwrap_or_default()
    }

    /// Drain collected listener errors and log them.
    pub(crate) fn drop_errors(&self) {
        for err in self.take_errors() {
            Self::log_dropped(&err);
        }
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field("active", &self.active)
            .field("policy", &self.policy)
            .finish()
    }
}
