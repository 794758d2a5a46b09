//! A listener that writes events to `tracing`.

use super::{Callback, Event, EventData};
use async_trait::async_trait;
use tracing::{debug, info, trace, Level};

/// Logs every event it receives through the `tracing` framework.
///
/// Not always verbose: attach it to a chain with `verbose` set, or to the
/// [`ExecCtx`](crate::ExecCtx) of a verbose call.
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    level: Level,
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingHandler {
    /// Log at `level`. WARN and ERROR are logged at INFO.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn describe(data: &EventData<'_>) -> String {
        match data {
            EventData::ChainStart { chain_type, inputs } => {
                let mut keys: Vec<_> = inputs.keys().collect();
                keys.sort_unstable();
                format!("Entering chain '{}' with inputs {:?}", chain_type, keys)
            }
            EventData::ChainEnd {
                chain_type,
                outputs,
            } => {
                let mut keys: Vec<_> = outputs.keys().collect();
                keys.sort_unstable();
                format!("Finished chain '{}' with outputs {:?}", chain_type, keys)
            }
            EventData::ChainError { chain_type, error } => {
                format!("Chain '{}' failed: {}", chain_type, error)
            }
            EventData::ModelStart {
                model_type,
                prompts,
                ..
            } => format!("Calling model '{}' with {} prompt(s)", model_type, prompts.len()),
            EventData::ModelEnd { model_type, result } => format!(
                "Model '{}' returned {} generation group(s)",
                model_type,
                result.generations.len()
            ),
            EventData::ModelError { model_type, error } => {
                format!("Model '{}' failed: {}", model_type, error)
            }
            EventData::RetrieverStart { query } => format!("Retrieving documents for {:?}", query),
            EventData::RetrieverEnd { documents, .. } => {
                format!("Retrieved {} document(s)", documents.len())
            }
            EventData::RetrieverError { error, .. } => format!("Retrieval failed: {}", error),
        }
    }
}

#[async_trait]
impl Callback for LoggingHandler {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_event(&self, event: &Event<'_>) -> anyhow::Result<()> {
        let message = Self::describe(&event.data);
        let run_id = event.meta.run_id;
        let kind = event.kind().as_str();
        match self.level {
            Level::TRACE => trace!(%run_id, kind, "{}", message),
            Level::DEBUG => debug!(%run_id, kind, "{}", message),
            _ => info!(%run_id, kind, "{}", message),
        }
        Ok(())
    }
}
