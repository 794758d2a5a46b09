//! Retriever collaborator trait.
//!
//! Ranking and limiting are the retriever's job: chains pass the returned
//! documents on verbatim.

use crate::types::Document;
use async_trait::async_trait;

/// Fetches documents relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn get_relevant_documents(&self, query: &str) -> anyhow::Result<Vec<Document>>;
}

/// A retriever that always returns the same documents.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    documents: Vec<Document>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Build from plain text contents.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(Document::new).collect())
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn get_relevant_documents(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}
