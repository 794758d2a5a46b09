//! Fake model for testing without a live provider.
//!
//! [`FakeModel`] returns pre-configured responses in order, allowing
//! deterministic tests of chains built on this crate.
//!
//! # Example
//!
//! ```
//! use llm_chains::model::FakeModel;
//!
//! let fake = FakeModel::fixed("42");
//! assert_eq!(fake.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{GenerateOptions, LanguageModel};
use crate::types::{Generation, ModelResult};

/// A test model that returns canned responses in order.
///
/// Every prompt in a call consumes one response. Cycles back to the
/// beginning when all responses have been used.
#[derive(Debug)]
pub struct FakeModel {
    responses: Vec<String>,
    index: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeModel {
    /// Create a fake with the given canned responses.
    ///
    /// An empty list makes every call return empty candidate groups, which
    /// is useful for exercising empty-generation handling.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            index: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a fake that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_group(&self) -> Vec<Generation> {
        if self.responses.is_empty() {
            return Vec::new();
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        vec![Generation::new(self.responses[idx].clone())]
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(
        &self,
        prompts: &[String],
        _options: &GenerateOptions,
    ) -> anyhow::Result<ModelResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResult {
            generations: prompts.iter().map(|_| self.next_group()).collect(),
            llm_output: Map::new(),
        })
    }

    fn model_type(&self) -> &str {
        "llm.Fake"
    }

    fn invocation_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("responses".to_string(), json!(self.responses.len()));
        params
    }
}
