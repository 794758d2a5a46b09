//! Composite chain that stuffs documents into a single context block.

use super::{merge_input_keys, validate_nested, BoxFut, Chain, ChainOptions};
use crate::callbacks::Callback;
use crate::error::{ChainError, Result};
use crate::exec_ctx::ExecCtx;
use crate::memory::Memory;
use crate::types::Document;
use crate::values::{type_mismatch, ChainValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CHAIN_TYPE: &str = "stuff-documents";

/// Key names and separator for a [`StuffDocumentsChain`].
///
/// Deserializable with defaults for every field, so it can sit inside a host
/// application's config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuffDocumentsOptions {
    /// Question passed through to the inner chain. Default: `"question"`.
    pub question_key: String,
    /// Documents to join. Default: `"inputDocuments"`.
    pub documents_key: String,
    /// Key the joined block is stored under for the inner chain.
    /// Default: `"context"`.
    pub context_key: String,
    /// Placed between document contents. Default: a blank line.
    pub separator: String,
}

impl Default for StuffDocumentsOptions {
    fn default() -> Self {
        Self {
            question_key: "question".to_string(),
            documents_key: "inputDocuments".to_string(),
            context_key: "context".to_string(),
            separator: "\n\n".to_string(),
        }
    }
}

/// Joins every document's content into one context string and hands it to
/// an inner chain along with the rest of the bag.
///
/// Documents are joined in the order supplied. An empty list still invokes
/// the inner chain, with an empty context.
pub struct StuffDocumentsChain {
    inner: Box<dyn Chain>,
    config: StuffDocumentsOptions,
    options: ChainOptions,
}

impl StuffDocumentsChain {
    /// Wrap `inner` with default key names.
    pub fn new(inner: Box<dyn Chain>) -> Result<Self> {
        Self::new_with(inner, StuffDocumentsOptions::default())
    }

    /// Fails with [`ChainError::InvalidConfig`] when `inner` does not take
    /// the context key as an input.
    pub fn new_with(inner: Box<dyn Chain>, config: StuffDocumentsOptions) -> Result<Self> {
        if !inner.input_keys().contains(&config.context_key) {
            return Err(ChainError::InvalidConfig(format!(
                "Inner chain '{}' does not take context key '{}' (inputs: {:?})",
                inner.chain_type(),
                config.context_key,
                inner.input_keys()
            )));
        }
        Ok(Self {
            inner,
            config,
            options: ChainOptions::default(),
        })
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

    pub fn config(&self) -> &StuffDocumentsOptions {
        &self.config
    }

    pub fn inner(&self) -> &dyn Chain {
        self.inner.as_ref()
    }

    /// Join document contents with the configured separator.
    pub fn combine(&self, documents: &[Document]) -> String {
        documents
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.separator)
    }
}

impl Chain for StuffDocumentsChain {
    fn chain_type(&self) -> &str {
        CHAIN_TYPE
    }

    fn input_keys(&self) -> Vec<String> {
        merge_input_keys(
            &[
                self.config.documents_key.as_str(),
                self.config.question_key.as_str(),
            ],
            self.inner.as_ref(),
            &[self.config.context_key.as_str()],
        )
    }

    fn output_keys(&self) -> Vec<String> {
        self.inner.output_keys()
    }

    fn options(&self) -> &ChainOptions {
        &self.options
    }

    fn validate_types(&self, values: &ChainValues) -> Result<()> {
        if let Some(value) = values.get(&self.config.documents_key) {
            if value.as_documents().is_none() {
                return Err(type_mismatch(
                    CHAIN_TYPE,
                    &self.config.documents_key,
                    "documents",
                    value,
                ));
            }
        }
        if let Some(value) = values.get(&self.config.question_key) {
            if value.as_text().is_none() {
                return Err(type_mismatch(
                    CHAIN_TYPE,
                    &self.config.question_key,
                    "text",
                    value,
                ));
            }
        }
        validate_nested(
            self.inner.as_ref(),
            values,
            &[self.config.context_key.as_str()],
        )
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        values: &'a ChainValues,
    ) -> BoxFut<'a, Result<ChainValues>> {
        Box::pin(async move {
            let documents = values.documents(CHAIN_TYPE, &self.config.documents_key)?;
            let context = self.combine(documents);

            let inner_values = values
                .clone()
                .with(self.config.context_key.clone(), context);
            let out = self.inner.call(ctx, inner_values).await?;
            Ok(out.select(&self.inner.output_keys()))
        })
    }
}

impl std::fmt::Debug for StuffDocumentsChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StuffDocumentsChain")
            .field("inner", &self.inner.chain_type())
            .field("config", &self.config)
            .field("options", &self.options)
            .finish()
    }
}
