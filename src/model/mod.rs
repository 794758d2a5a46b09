//! Language-model collaborator trait and generation options.
//!
//! The [`LanguageModel`] trait abstracts over providers. The crate ships no
//! network clients; implement the trait for your provider, or use
//! [`FakeModel`] in tests.
//!
//! ## Architecture
//!
//! ```text
//! LlmChain ──► render prompt ──► LanguageModel::generate(&[prompt]) ──► ModelResult
//!                                          │
//!                               ┌──────────┴──────────┐
//!                          your provider          FakeModel
//! ```

pub mod fake;

pub use fake::FakeModel;

use crate::types::ModelResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Per-call generation options forwarded to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Stop sequences.
    pub stop: Vec<String>,

    /// Sampling temperature, if the caller wants to override the model default.
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Optional token-counting capability of a model.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize>;
}

/// Abstraction over text-generation providers.
///
/// `generate` must return one candidate group per prompt, in prompt order.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate completions for each prompt.
    async fn generate(
        &self,
        prompts: &[String],
        options: &GenerateOptions,
    ) -> anyhow::Result<ModelResult>;

    /// Stable type name for events and diagnostics (e.g. `"llm.Fake"`).
    fn model_type(&self) -> &str;

    /// Parameters describing how the model is invoked (model name,
    /// temperature, ...). Reported on model-start events.
    fn invocation_params(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Token counter, if the model provides one.
    fn tokenizer(&self) -> Option<&dyn Tokenizer> {
        None
    }
}
