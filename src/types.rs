use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A unit of retrieved content.
///
/// Produced by a [`Retriever`](crate::retriever::Retriever) and consumed by
/// text-assembly chains. Never mutated after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The text content.
    pub page_content: String,

    /// Arbitrary metadata (source, score, page number, ...).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A single candidate completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub text: String,

    /// Provider-specific auxiliary info (finish reason, logprobs, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Map<String, Value>>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            info: None,
        }
    }
}

/// Output of a [`LanguageModel::generate`](crate::model::LanguageModel::generate) call.
///
/// `generations` holds one group of ranked candidates per input prompt, in
/// prompt order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    /// Candidate groups, one per prompt.
    pub generations: Vec<Vec<Generation>>,

    /// Provider-level output metadata (token usage, model name, ...).
    #[serde(default)]
    pub llm_output: Map<String, Value>,
}

impl ModelResult {
    /// Text of the top candidate of the first group, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.generations
            .first()
            .and_then(|group| group.first())
            .map(|g| g.text.as_str())
    }
}
