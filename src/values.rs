//! The key-value payload threaded between chains.
//!
//! [`ChainValues`] maps string keys to [`ChainValue`], a tagged union over
//! the kinds of data chains exchange. Typed accessors turn a missing key into
//! [`ChainError::InvalidInput`] and a wrong kind into
//! [`ChainError::InputTypeMismatch`], so every chain enforces its input
//! contract the same way.

use crate::error::{ChainError, Result};
use crate::types::{Document, Generation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single value in a [`ChainValues`] bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChainValue {
    /// Plain text (queries, rendered prompts, answers).
    Text(String),
    /// Retrieved documents, in retriever order.
    Documents(Vec<Document>),
    /// Candidate completions from a model.
    Generations(Vec<Generation>),
    /// Anything else.
    Json(Value),
}

impl ChainValue {
    /// Stable name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainValue::Text(_) => "text",
            ChainValue::Documents(_) => "documents",
            ChainValue::Generations(_) => "generations",
            ChainValue::Json(_) => "json",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChainValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_documents(&self) -> Option<&[Document]> {
        match self {
            ChainValue::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    pub fn as_generations(&self) -> Option<&[Generation]> {
        match self {
            ChainValue::Generations(gens) => Some(gens),
            _ => None,
        }
    }

    /// Text form for prompt substitution. `None` for kinds that have no
    /// sensible inline rendering (documents, generations).
    pub fn to_prompt_text(&self) -> Option<String> {
        match self {
            ChainValue::Text(s) => Some(s.clone()),
            ChainValue::Json(Value::String(s)) => Some(s.clone()),
            ChainValue::Json(other) => Some(other.to_string()),
            ChainValue::Documents(_) | ChainValue::Generations(_) => None,
        }
    }

    /// Convert to a plain JSON value (documents and generations serialize
    /// as arrays of objects).
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            ChainValue::Text(s) => Value::String(s.clone()),
            ChainValue::Documents(docs) => serde_json::to_value(docs)?,
            ChainValue::Generations(gens) => serde_json::to_value(gens)?,
            ChainValue::Json(v) => v.clone(),
        })
    }
}

impl From<String> for ChainValue {
    fn from(s: String) -> Self {
        ChainValue::Text(s)
    }
}

impl From<&str> for ChainValue {
    fn from(s: &str) -> Self {
        ChainValue::Text(s.to_string())
    }
}

impl From<Vec<Document>> for ChainValue {
    fn from(docs: Vec<Document>) -> Self {
        ChainValue::Documents(docs)
    }
}

impl From<Vec<Generation>> for ChainValue {
    fn from(gens: Vec<Generation>) -> Self {
        ChainValue::Generations(gens)
    }
}

impl From<Value> for ChainValue {
    fn from(v: Value) -> Self {
        ChainValue::Json(v)
    }
}

/// The structured value bag passed into and returned from every chain.
///
/// # Example
///
/// ```
/// use llm_chains::ChainValues;
///
/// let values = ChainValues::from([("query", "What is the answer?")]);
/// assert_eq!(values.text("example", "query").unwrap(), "What is the answer?");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainValues {
    data: HashMap<String, ChainValue>,
}

impl ChainValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ChainValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one under that key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ChainValue>,
    ) -> Option<ChainValue> {
        self.data.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ChainValue> {
        self.data.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ChainValue> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChainValue)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Merge `other` into this bag. Keys from `other` win on conflict.
    pub fn merge(&mut self, other: ChainValues) {
        self.data.extend(other.data);
    }

    /// Owned variant of [`merge`](Self::merge).
    pub fn merged(mut self, other: ChainValues) -> Self {
        self.merge(other);
        self
    }

    /// A new bag holding only `keys` (missing keys are skipped).
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> ChainValues {
        keys.iter()
            .filter_map(|k| {
                let k = k.as_ref();
                self.data.get(k).map(|v| (k.to_string(), v.clone()))
            })
            .collect()
    }

    /// Look up a required key on behalf of `chain`.
    pub fn require(&self, chain: &str, key: &str) -> Result<&ChainValue> {
        self.data.get(key).ok_or_else(|| ChainError::InvalidInput {
            chain: chain.to_string(),
            key: key.to_string(),
        })
    }

    /// Look up a required text value.
    pub fn text(&self, chain: &str, key: &str) -> Result<&str> {
        let value = self.require(chain, key)?;
        value
            .as_text()
            .ok_or_else(|| type_mismatch(chain, key, "text", value))
    }

    /// Look up a required document list.
    pub fn documents(&self, chain: &str, key: &str) -> Result<&[Document]> {
        let value = self.require(chain, key)?;
        value
            .as_documents()
            .ok_or_else(|| type_mismatch(chain, key, "documents", value))
    }

    /// Deserialize a value into a typed `T`.
    ///
    /// Useful for pulling structured output out of the bag at the edge of a
    /// workflow.
    pub fn parse_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.require("chain-values", key)?;
        Ok(serde_json::from_value(value.to_json()?)?)
    }

    /// Consume the bag, returning the underlying map.
    pub fn into_inner(self) -> HashMap<String, ChainValue> {
        self.data
    }
}

/// Build an [`ChainError::InputTypeMismatch`] for `value`.
pub(crate) fn type_mismatch(
    chain: &str,
    key: &str,
    expected: &'static str,
    value: &ChainValue,
) -> ChainError {
    ChainError::InputTypeMismatch {
        chain: chain.to_string(),
        key: key.to_string(),
        expected,
        found: value.kind(),
    }
}

impl<K: Into<String>, V: Into<ChainValue>> FromIterator<(K, V)> for ChainValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<ChainValue>, const N: usize> From<[(K, V); N]> for ChainValues {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<ChainValue>> Extend<(K, V)> for ChainValues {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.data
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl IntoIterator for ChainValues {
    type Item = (String, ChainValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, ChainValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_accessor() {
        let values = ChainValues::from([("query", "hello")]);
        assert_eq!(values.text("qa", "query").unwrap(), "hello");
    }

    #[test]
    fn test_missing_key_is_invalid_input() {
        let values = ChainValues::new();
        let err = values.text("qa", "query").unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidInput { ref chain, ref key } if chain == "qa" && key == "query"
        ));
    }

    #[test]
    fn test_wrong_kind_is_type_mismatch() {
        let values = ChainValues::new().with("query", json!(42));
        let err = values.text("qa", "query").unwrap_err();
        assert!(matches!(
            err,
            ChainError::InputTypeMismatch { expected: "text", found: "json", .. }
        ));

        let values = ChainValues::new().with("docs", "not docs");
        let err = values.documents("stuff", "docs").unwrap_err();
        assert!(matches!(
            err,
            ChainError::InputTypeMismatch { expected: "documents", found: "text", .. }
        ));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut a = ChainValues::from([("x", "1"), ("y", "2")]);
        let b = ChainValues::from([("y", "3"), ("z", "4")]);
        a.merge(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.text("t", "x").unwrap(), "1");
        assert_eq!(a.text("t", "y").unwrap(), "3");
        assert_eq!(a.text("t", "z").unwrap(), "4");
    }

    #[test]
    fn test_select_skips_missing() {
        let values = ChainValues::from([("a", "1"), ("b", "2")]);
        let picked = values.select(&["a", "missing"]);
        assert_eq!(picked.len(), 1);
        assert!(picked.contains_key("a"));
    }

    #[test]
    fn test_prompt_text() {
        assert_eq!(ChainValue::from("hi").to_prompt_text().as_deref(), Some("hi"));
        assert_eq!(ChainValue::from(json!("s")).to_prompt_text().as_deref(), Some("s"));
        assert_eq!(ChainValue::from(json!({"a": 1})).to_prompt_text().as_deref(), Some(r#"{"a":1}"#));
        assert!(ChainValue::from(vec![Document::new("d")]).to_prompt_text().is_none());
    }

    #[test]
    fn test_parse_as_documents() {
        let values = ChainValues::new().with("docs", vec![Document::new("a"), Document::new("b")]);
        let docs: Vec<Document> = values.parse_as("docs").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].page_content, "b");
    }

    #[test]
    fn test_parse_as_missing_key() {
        let values = ChainValues::new();
        let err = values.parse_as::<String>("nope").unwrap_err();
        assert!(matches!(err, ChainError::InvalidInput { ref key, .. } if key == "nope"));
    }

    #[test]
    fn test_serde_tagged_roundtrip_shape() {
        let values = ChainValues::new().with("q", "hi");
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json, json!({"q": {"kind": "text", "value": "hi"}}));
    }
}
