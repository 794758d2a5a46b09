use crate::callbacks::EventKind;
use crate::values::ChainValues;
use std::fmt;
use thiserror::Error;

/// Boxed error type used for collaborator and listener failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which external collaborator a [`ChainError::Collaborator`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorKind {
    /// A [`LanguageModel`](crate::model::LanguageModel) backend.
    Model,
    /// A [`Retriever`](crate::retriever::Retriever).
    Retriever,
    /// A [`Memory`](crate::memory::Memory) collaborator.
    Memory,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollaboratorKind::Model => "model",
            CollaboratorKind::Retriever => "retriever",
            CollaboratorKind::Memory => "memory",
        })
    }
}

/// Errors produced by chains and their components.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A required input key was absent from the value bag.
    #[error("Chain '{chain}': missing required input key '{key}'")]
    InvalidInput { chain: String, key: String },

    /// An input key was present but held the wrong kind of value.
    #[error("Chain '{chain}': input '{key}' must be {expected}, got {found}")]
    InputTypeMismatch {
        chain: String,
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A prompt template variable could not be rendered.
    #[error("Template variable '{variable}' could not be rendered: {reason}")]
    TemplateRender { variable: String, reason: String },

    /// The model returned no usable candidate.
    #[error("Chain '{chain}': model returned no usable generation")]
    EmptyGeneration { chain: String },

    /// A model, retriever or memory call failed.
    #[error("Chain '{chain}': {collaborator} failed: {source}")]
    Collaborator {
        chain: String,
        collaborator: CollaboratorKind,
        #[source]
        source: BoxError,
    },

    /// The invocation was cancelled through its [`ExecCtx`](crate::ExecCtx).
    #[error("Chain was cancelled")]
    Cancelled,

    /// The chain succeeded but one or more callback listeners failed.
    ///
    /// Only returned under [`ListenerErrorPolicy::Collect`](crate::ListenerErrorPolicy).
    /// The chain's real result travels in `values`.
    #[error("{} callback listener(s) failed: {}", .errors.len(), join_listener_errors(.errors))]
    Listener {
        errors: Vec<ListenerError>,
        values: Box<ChainValues>,
    },

    /// A chain implementation did not produce one of its declared output keys.
    #[error("Chain '{chain}' did not produce declared output key '{key}'")]
    MissingOutput { chain: String, key: String },

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON conversion failed at the serde level.
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Wrap a collaborator failure, keeping cancellation recognizable.
    pub(crate) fn collaborator(
        chain: &str,
        collaborator: CollaboratorKind,
        err: anyhow::Error,
    ) -> Self {
        match err.downcast::<ChainError>() {
            Ok(ChainError::Cancelled) => ChainError::Cancelled,
            Ok(other) => ChainError::Collaborator {
                chain: chain.to_string(),
                collaborator,
                source: Box::new(other),
            },
            Err(err) => ChainError::Collaborator {
                chain: chain.to_string(),
                collaborator,
                source: err.into(),
            },
        }
    }

    /// Whether this error came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChainError::Cancelled)
    }

    /// For [`ChainError::Listener`], recover the chain's successful result.
    pub fn into_values(self) -> Option<ChainValues> {
        match self {
            ChainError::Listener { values, .. } => Some(*values),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ChainError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ChainError>() {
            Ok(inner) => inner,
            Err(err) => ChainError::Other(err.to_string()),
        }
    }
}

/// A callback listener failed while handling an event.
#[derive(Error, Debug)]
#[error("listener '{listener}' failed on {event}: {source}")]
pub struct ListenerError {
    /// [`Callback::name`](crate::callbacks::Callback::name) of the listener.
    pub listener: String,
    /// The event being delivered.
    pub event: EventKind,
    #[source]
    pub source: BoxError,
}

fn join_listener_errors(errors: &[ListenerError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_keeps_cancellation() {
        let err = ChainError::collaborator(
            "retrieval-qa",
            CollaboratorKind::Retriever,
            anyhow::Error::new(ChainError::Cancelled),
        );
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_collaborator_wraps_source() {
        let err = ChainError::collaborator(
            "llm-chain",
            CollaboratorKind::Model,
            anyhow::anyhow!("connection refused"),
        );
        assert_eq!(
            err.to_string(),
            "Chain 'llm-chain': model failed: connection refused"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_anyhow_unwraps_chain_error() {
        let err: ChainError = anyhow::Error::new(ChainError::EmptyGeneration {
            chain: "llm-chain".into(),
        })
        .into();
        assert!(matches!(err, ChainError::EmptyGeneration { .. }));

        let err: ChainError = anyhow::anyhow!("plain").into();
        assert!(matches!(err, ChainError::Other(ref m) if m == "plain"));
    }

    #[test]
    fn test_listener_error_display() {
        let err = ChainError::Listener {
            errors: vec![ListenerError {
                listener: "tracker".into(),
                event: EventKind::ModelEnd,
                source: "no run info".into(),
            }],
            values: Box::default(),
        };
        assert_eq!(
            err.to_string(),
            "1 callback listener(s) failed: listener 'tracker' failed on model-end: no run info"
        );
        assert!(err.into_values().is_some());
    }
}
