//! Chain contract and invocation driver.
//!
//! A [`Chain`] declares the keys it consumes and produces and implements
//! [`execute`](Chain::execute). Callers go through [`call`](Chain::call),
//! which wraps `execute` with the shared lifecycle:
//!
//! 1. fail-fast validation (no events, no collaborator calls),
//! 2. chain-start event,
//! 3. memory load, execution, output check, memory save,
//! 4. chain-end or chain-error event,
//! 5. listener error policy for top-level calls.
//!
//! Chains nest: a composite chain calls its children through `call` with
//! the child context it receives, so every run in the tree is correlated.

pub mod llm;
pub mod retrieval_qa;
pub mod stuff;

pub use llm::LlmChain;
pub use retrieval_qa::{RetrievalQa, RetrievalQaOptions};
pub use stuff::{StuffDocumentsChain, StuffDocumentsOptions};

use crate::callbacks::{Callback, EventData, RunMeta};
use crate::error::{ChainError, CollaboratorKind, Result};
use crate::exec_ctx::ExecCtx;
use crate::memory::Memory;
use crate::values::ChainValues;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A boxed, pinned, Send future: the return type of [`Chain::call`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-instance settings shared by every chain.
#[derive(Clone, Default)]
pub struct ChainOptions {
    /// Dispatch events even when no listener is always verbose.
    pub verbose: bool,
    /// Listeners attached to this chain. Nested chains inherit them.
    pub callbacks: Vec<Arc<dyn Callback>>,
    pub memory: Option<Arc<dyn Memory>>,
}

impl ChainOptions {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_callback(mut self, handler: Arc<dyn Callback>) -> Self {
        self.callbacks.push(handler);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }
}

impl std::fmt::Debug for ChainOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainOptions")
            .field("verbose", &self.verbose)
            .field(
                "callbacks",
                &self.callbacks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field("has_memory", &self.memory.is_some())
            .finish()
    }
}

/// A composable processing stage.
///
/// Object-safe, so chains can be stored as `Box<dyn Chain>` and nested.
/// Implementations hold no per-call state; one instance may serve concurrent
/// calls.
pub trait Chain: Send + Sync {
    /// Stable type name reported in events and errors (e.g. `"llm-chain"`).
    fn chain_type(&self) -> &str;

    /// Keys that must be present in the bag before the chain runs.
    fn input_keys(&self) -> Vec<String>;

    /// Keys the chain adds to the bag on success.
    fn output_keys(&self) -> Vec<String>;

    fn options(&self) -> &ChainOptions;

    fn verbose(&self) -> bool {
        self.options().verbose
    }

    fn callbacks(&self) -> &[Arc<dyn Callback>] {
        &self.options().callbacks
    }

    fn memory(&self) -> Option<&Arc<dyn Memory>> {
        self.options().memory.as_ref()
    }

    /// Check the kinds of the input values that are present. Absent keys
    /// are not an error here.
    fn validate_types(&self, values: &ChainValues) -> Result<()> {
        let _ = values;
        Ok(())
    }

    /// Do the chain's own work and return only its outputs.
    ///
    /// `ctx` belongs to this run: nested chains and collaborator events go
    /// through it. Called by [`call`](Self::call) after validation; do not
    /// call it directly.
    fn execute<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        values: &'a ChainValues,
    ) -> BoxFut<'a, Result<ChainValues>>;

    /// Invoke the chain. Returns the input bag extended with every output key.
    fn call<'a>(&'a self, ctx: &'a ExecCtx, values: ChainValues) -> BoxFut<'a, Result<ChainValues>> {
        Box::pin(drive(self, ctx, values))
    }

    /// Text in, text out, for chains with exactly one input and one output key.
    fn run<'a>(&'a self, ctx: &'a ExecCtx, input: &'a str) -> BoxFut<'a, Result<String>> {
        Box::pin(run_single(self, ctx, input))
    }
}

async fn drive<C: Chain + ?Sized>(
    chain: &C,
    ctx: &ExecCtx,
    values: ChainValues,
) -> Result<ChainValues> {
    let chain_type = chain.chain_type();
    let memory = chain.memory();
    let memory_keys = memory.map(|m| m.memory_keys()).unwrap_or_default();
    let input_keys = chain.input_keys();

    for key in input_keys.iter().filter(|k| !memory_keys.contains(*k)) {
        values.require(chain_type, key)?;
    }
    chain.validate_types(&values)?;

    let run_id = Uuid::new_v4();
    let parent_run_id = ctx.run_id();
    let callbacks = ctx.callbacks().for_run(chain.callbacks(), chain.verbose());
    debug!(chain = chain_type, %run_id, "Starting chain");
    callbacks
        .notify(
            RunMeta::new(run_id, parent_run_id),
            EventData::ChainStart {
                chain_type,
                inputs: &values,
            },
        )
        .await;

    let run_ctx = ctx.child(run_id, callbacks.clone());
    match invoke(chain, &run_ctx, values, &input_keys, memory).await {
        Ok((values, outputs)) => {
            callbacks
                .notify(
                    RunMeta::new(run_id, parent_run_id),
                    EventData::ChainEnd {
                        chain_type,
                        outputs: &outputs,
                    },
                )
                .await;
            debug!(chain = chain_type, %run_id, "Finished chain");

            if ctx.is_root() {
                let errors = callbacks.take_errors();
                if !errors.is_empty() {
                    return Err(ChainError::Listener {
                        errors,
                        values: Box::new(values),
                    });
                }
            }
            Ok(values)
        }
        Err(err) => {
            callbacks
                .notify(
                    RunMeta::new(run_id, parent_run_id),
                    EventData::ChainError {
                        chain_type,
                        error: &err,
                    },
                )
                .await;
            debug!(chain = chain_type, %run_id, error = %err, "Chain failed");

            if ctx.is_root() {
                callbacks.drop_errors();
            }
            Err(err)
        }
    }
}

/// Everything between chain-start and chain-end. Returns the merged bag and
/// the chain's own outputs.
async fn invoke<C: Chain + ?Sized>(
    chain: &C,
    ctx: &ExecCtx,
    mut values: ChainValues,
    input_keys: &[String],
    memory: Option<&Arc<dyn Memory>>,
) -> Result<(ChainValues, ChainValues)> {
    let chain_type = chain.chain_type();
    ctx.check_cancelled()?;

    let inputs = match memory {
        Some(memory) => {
            let inputs = values.clone();
            let loaded = ctx
                .guard(memory.load(&values))
                .await?
                .map_err(|e| ChainError::collaborator(chain_type, CollaboratorKind::Memory, e))?;
            values.merge(loaded);
            for key in input_keys {
                values.require(chain_type, key)?;
            }
            chain.validate_types(&values)?;
            Some(inputs)
        }
        None => None,
    };

    let outputs = chain.execute(ctx, &values).await?;
    for key in chain.output_keys() {
        if !outputs.contains_key(&key) {
            return Err(ChainError::MissingOutput {
                chain: chain_type.to_string(),
                key,
            });
        }
    }

    if let (Some(memory), Some(inputs)) = (memory, inputs) {
        ctx.guard(memory.save(&inputs, &outputs))
            .await?
            .map_err(|e| ChainError::collaborator(chain_type, CollaboratorKind::Memory, e))?;
    }

    values.merge(outputs.clone());
    Ok((values, outputs))
}

async fn run_single<C: Chain + ?Sized>(chain: &C, ctx: &ExecCtx, input: &str) -> Result<String> {
    let memory_keys = chain.memory().map(|m| m.memory_keys()).unwrap_or_default();
    let inputs: Vec<String> = chain
        .input_keys()
        .into_iter()
        .filter(|k| !memory_keys.contains(k))
        .collect();
    let outputs = chain.output_keys();

    let (input_key, output_key) = match (inputs.as_slice(), outputs.as_slice()) {
        ([input_key], [output_key]) => (input_key.clone(), output_key.clone()),
        _ => {
            return Err(ChainError::InvalidConfig(format!(
                "Chain '{}' has {} input key(s) and {} output key(s); run() needs exactly one of each",
                chain.chain_type(),
                inputs.len(),
                outputs.len()
            )))
        }
    };

    let values = chain
        .call(ctx, ChainValues::new().with(input_key, input))
        .await?;
    Ok(values.text(chain.chain_type(), &output_key)?.to_string())
}

/// Keys of `inner` that the caller still has to supply once `supplied` are
/// filled in by the enclosing chain, appended to `own` without duplicates.
/// Keys provided by `inner`'s own memory are never demanded from the caller.
pub(crate) fn merge_input_keys(own: &[&str], inner: &dyn Chain, supplied: &[&str]) -> Vec<String> {
    let memory_keys = inner.memory().map(|m| m.memory_keys()).unwrap_or_default();
    let mut keys: Vec<String> = own.iter().map(|k| k.to_string()).collect();
    for key in inner.input_keys() {
        if !supplied.contains(&key.as_str())
            && !memory_keys.contains(&key)
            && !keys.contains(&key)
        {
            keys.push(key);
        }
    }
    keys
}

/// Type-check the caller values that reach `inner` unchanged.
///
/// Keys in `supplied` are overwritten by the enclosing chain and keys from
/// `inner`'s memory are replaced at load time, so neither is checked here.
pub(crate) fn validate_nested(
    inner: &dyn Chain,
    values: &ChainValues,
    supplied: &[&str],
) -> Result<()> {
    let memory_keys = inner.memory().map(|m| m.memory_keys()).unwrap_or_default();
    let passed: ChainValues = values
        .iter()
        .filter(|(k, _)| !supplied.contains(k) && !memory_keys.iter().any(|m| m == k))
        .map(|(k, v)| (k, v.clone()))
        .collect();
    inner.validate_types(&passed)
}
