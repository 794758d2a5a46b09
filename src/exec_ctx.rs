//! Execution context shared across chain invocations.
//!
//! [`ExecCtx`] carries the cancellation token, call-time callback listeners,
//! and the listener error policy. Build one per logical request and pass it
//! to [`Chain::call`](crate::Chain::call); chains derive a child context for
//! each nested run so events can be correlated.

use crate::callbacks::{Callback, CallbackManager, ListenerErrorPolicy};
use crate::error::{ChainError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared execution context for chain invocations.
///
/// # Example
///
/// ```
/// use llm_chains::callbacks::RecordingHandler;
/// use llm_chains::{ExecCtx, ListenerErrorPolicy};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = ExecCtx::builder()
///     .cancellation(token.clone())
///     .callback(Arc::new(RecordingHandler::new()))
///     .listener_errors(ListenerErrorPolicy::Collect)
///     .build();
///
/// assert!(!ctx.is_cancelled());
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct ExecCtx {
    cancellation: CancellationToken,
    callbacks: CallbackManager,
    run_id: Option<Uuid>,
}

impl ExecCtx {
    /// A context with no listeners and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder::default()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ChainError::Cancelled);
        }
        Ok(())
    }

    /// Run id of the chain that owns this context. `None` for a context
    /// built by the caller.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Whether a chain called with this context is a top-level invocation.
    pub fn is_root(&self) -> bool {
        self.run_id.is_none()
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    /// Await `fut`, giving up with [`ChainError::Cancelled`] as soon as the
    /// token is cancelled. Cancellation wins if both are ready.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(ChainError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Context for work done inside the chain run `run_id`.
    pub(crate) fn child(&self, run_id: Uuid, callbacks: CallbackManager) -> Self {
        Self {
            cancellation: self.cancellation.clone(),
            callbacks,
            run_id: Some(run_id),
        }
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("cancelled", &self.is_cancelled())
            .field("callbacks", &self.callbacks)
            .field("run_id", &self.run_id)
            .finish()
    }
}

/// Builder for [`ExecCtx`].
#[derive(Default)]
pub struct ExecCtxBuilder {
    cancellation: Option<CancellationToken>,
    callbacks: Vec<Arc<dyn Callback>>,
    policy: ListenerErrorPolicy,
}

impl ExecCtxBuilder {
    /// Set the cancellation token. Default: a fresh token nobody else holds.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Add a call-time listener. It is inherited by every chain in the
    /// invocation tree and runs before each chain's own listeners.
    pub fn callback(mut self, handler: Arc<dyn Callback>) -> Self {
        self.callbacks.push(handler);
        self
    }

    /// Set all call-time listeners at once.
    pub fn callbacks(mut self, handlers: Vec<Arc<dyn Callback>>) -> Self {
        self.callbacks = handlers;
        self
    }

    /// What to do with listener errors. Default: [`ListenerErrorPolicy::LogAndDrop`].
    pub fn listener_errors(mut self, policy: ListenerErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ExecCtx {
        ExecCtx {
            cancellation: self.cancellation.unwrap_or_default(),
            callbacks: CallbackManager::new(self.callbacks, self.policy),
            run_id: None,
        }
    }
}
