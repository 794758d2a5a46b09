//! Leaf chain: render a prompt and ask a language model.

use super::{BoxFut, Chain, ChainOptions};
use crate::callbacks::{Callback, EventData, RunMeta};
use crate::error::{ChainError, CollaboratorKind, Result};
use crate::exec_ctx::ExecCtx;
use crate::memory::Memory;
use crate::model::{GenerateOptions, LanguageModel};
use crate::prompt::{PromptTemplate, Template};
use crate::types::ModelResult;
use crate::values::{type_mismatch, ChainValues};
use std::sync::Arc;
use uuid::Uuid;

const CHAIN_TYPE: &str = "llm-chain";

/// Renders a [`PromptTemplate`] with the input bag and returns the model's
/// top candidate under the output key.
///
/// Input keys are the template's variables. Exactly one prompt is sent per
/// call, and the model must answer with exactly one non-empty candidate
/// group or the call fails with [`ChainError::EmptyGeneration`].
///
/// # Example
///
/// ```
/// use llm_chains::{Chain, ChainValues, ExecCtx, FakeModel, LlmChain};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let chain = LlmChain::from_template(Arc::new(FakeModel::fixed("Paris")), "Capital of {country}?")?;
/// let out = chain
///     .call(&ExecCtx::new(), ChainValues::from([("country", "France")]))
///     .await?;
/// assert_eq!(out.text("example", "text")?, "Paris");
/// # Ok::<(), llm_chains::ChainError>(())
/// # }).unwrap();
/// ```
pub struct LlmChain {
    prompt: Arc<dyn PromptTemplate>,
    model: Arc<dyn LanguageModel>,
    output_key: String,
    candidates_key: Option<String>,
    generate_options: GenerateOptions,
    options: ChainOptions,
}

impl LlmChain {
    pub fn new(model: Arc<dyn LanguageModel>, prompt: Arc<dyn PromptTemplate>) -> Self {
        Self {
            prompt,
            model,
            output_key: "text".to_string(),
            candidates_key: None,
            generate_options: GenerateOptions::default(),
            options: ChainOptions::default(),
        }
    }

    /// Build with a `{name}` placeholder [`Template`].
    pub fn from_template(model: Arc<dyn LanguageModel>, template: &str) -> Result<Self> {
        Ok(Self::new(model, Arc::new(Template::new(template)?)))
    }

    /// Key for the generated text. Default: `"text"`.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Also return every candidate of the group under `key`.
    pub fn with_candidates_key(mut self, key: impl Into<String>) -> Self {
        self.candidates_key = Some(key.into());
        self
    }

    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate_options = options;
        self
    }

    pub fn with_chain_options(mut self, options: ChainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    pub fn with_callback(mut self, handler: Arc<dyn Callback>) -> Self {
        self.options.callbacks.push(handler);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.options.memory = Some(memory);
        self
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    pub fn prompt(&self) -> &dyn PromptTemplate {
        self.prompt.as_ref()
    }

    /// Count tokens with the model's tokenizer.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let tokenizer = self.model.tokenizer().ok_or_else(|| {
            ChainError::InvalidConfig(format!(
                "Model '{}' does not provide a tokenizer",
                self.model.model_type()
            ))
        })?;
        tokenizer
            .count_tokens(text)
            .map_err(|e| ChainError::collaborator(CHAIN_TYPE, CollaboratorKind::Model, e))
    }

    /// One model call, bracketed by model-start and model-end or model-error.
    async fn generate(&self, ctx: &ExecCtx, prompts: &[String]) -> Result<ModelResult> {
        let callbacks = ctx.callbacks();
        let model_type = self.model.model_type();
        let invocation_params = self.model.invocation_params();
        let run_id = Uuid::new_v4();
        let parent_run_id = ctx.run_id();

        callbacks
            .notify(
                RunMeta::new(run_id, parent_run_id),
                EventData::ModelStart {
                    model_type,
                    prompts,
                    invocation_params: &invocation_params,
                },
            )
            .await;

        let outcome = match ctx
            .guard(self.model.generate(prompts, &self.generate_options))
            .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(ChainError::collaborator(
                CHAIN_TYPE,
                CollaboratorKind::Model,
                err,
            )),
            Err(err) => Err(err),
        };

        let meta = RunMeta::new(run_id, parent_run_id);
        match &outcome {
            Ok(result) => {
                callbacks
                    .notify(meta, EventData::ModelEnd { model_type, result })
                    .await
            }
            Err(error) => {
                callbacks
                    .notify(meta, EventData::ModelError { model_type, error })
                    .await
            }
        }
        outcome
    }
}

impl Chain for LlmChain {
    fn chain_type(&self) -> &str {
        CHAIN_TYPE
    }

    fn input_keys(&self) -> Vec<String> {
        self.prompt.input_variables().to_vec()
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys = vec![self.output_key.clone()];
        if let Some(key) = &self.candidates_key {
            keys.push(key.clone());
        }
        keys
    }

    fn options(&self) -> &ChainOptions {
        &self.options
    }

    fn validate_types(&self, values: &ChainValues) -> Result<()> {
        for key in self.prompt.input_variables() {
            if let Some(value) = values.get(key) {
                if value.to_prompt_text().is_none() {
                    return Err(type_mismatch(CHAIN_TYPE, key, "text", value));
                }
            }
        }
        Ok(())
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        values: &'a ChainValues,
    ) -> BoxFut<'a, Result<ChainValues>> {
        Box::pin(async move {
            let prompts = vec![self.prompt.render(values)?];
            let result = self.generate(ctx, &prompts).await?;

            let group = match result.generations.as_slice() {
                [group] if !group.is_empty() => group,
                _ => {
                    return Err(ChainError::EmptyGeneration {
                        chain: CHAIN_TYPE.to_string(),
                    })
                }
            };

            let mut outputs = ChainValues::new().with(self.output_key.clone(), group[0].text.clone());
            if let Some(key) = &self.candidates_key {
                outputs.insert(key.clone(), group.clone());
            }
            Ok(outputs)
        })
    }
}

impl std::fmt::Debug for LlmChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmChain")
            .field("model", &self.model.model_type())
            .field("input_keys", &self.prompt.input_variables())
            .field("output_key", &self.output_key)
            .field("candidates_key", &self.candidates_key)
            .field("options", &self.options)
            .finish()
    }
}
