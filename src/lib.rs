//! # LLM Chains
//!
//! Composable chains for LLM workflows, with a uniform callback protocol.
//!
//! A chain consumes a [`ChainValues`] bag, does one step of work (rendering a
//! prompt, retrieving documents, stuffing them into a context) and returns
//! the bag extended with its outputs. Chains nest: [`RetrievalQa`] calls a
//! [`StuffDocumentsChain`], which calls an [`LlmChain`].
//!
//! Language models, retrievers and memory are collaborators behind narrow
//! traits ([`LanguageModel`](model::LanguageModel),
//! [`Retriever`](retriever::Retriever), [`Memory`](memory::Memory)). The
//! crate ships no network clients.
//!
//! ## Core Concepts
//!
//! - **[`Chain`]**: object-safe trait for a processing stage. Declares its
//!   input and output keys; [`Chain::call`] validates, emits lifecycle
//!   events, and runs the stage.
//! - **[`ExecCtx`]**: per-request context carrying the cancellation token,
//!   call-time listeners, and the listener error policy.
//! - **[`callbacks`]**: lifecycle events (chain, model, retriever) delivered
//!   to [`Callback`](callbacks::Callback) listeners with run-id correlation.
//! - **[`ChainError`]**: one error type for validation, collaborator,
//!   cancellation, and listener failures.
//!
//! ## Quick Start
//!
//! ```
//! use llm_chains::callbacks::RecordingHandler;
//! use llm_chains::{Chain, ChainValues, ExecCtx, FakeModel, RetrievalQa, StaticRetriever};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let qa = RetrievalQa::from_model(
//!     Arc::new(FakeModel::fixed("42")),
//!     Arc::new(StaticRetriever::from_texts(["Deep Thought computed 42."])),
//! )?
//! .with_return_source_documents(true);
//!
//! let recorder = Arc::new(RecordingHandler::new());
//! let ctx = ExecCtx::builder().callback(recorder.clone()).build();
//!
//! let out = qa
//!     .call(&ctx, ChainValues::from([("query", "What is the answer?")]))
//!     .await?;
//! assert_eq!(out.text("example", "answer")?, "42");
//! assert_eq!(out.documents("example", "sourceDocuments")?.len(), 1);
//! assert_eq!(recorder.trace()[0], "chain-start(retrieval-qa)");
//! # Ok::<(), llm_chains::ChainError>(())
//! # }).unwrap();
//! ```

pub mod callbacks;
pub mod chain;
pub mod error;
pub mod exec_ctx;
pub mod memory;
pub mod model;
pub mod prompt;
pub mod retriever;
pub mod types;
pub mod values;

pub use callbacks::{Callback, ListenerErrorPolicy};
pub use chain::{
    BoxFut, Chain, ChainOptions, LlmChain, RetrievalQa, RetrievalQaOptions, StuffDocumentsChain,
    StuffDocumentsOptions,
};
pub use error::{ChainError, CollaboratorKind, ListenerError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use model::{FakeModel, GenerateOptions, LanguageModel};
pub use prompt::{PromptTemplate, Template};
pub use retriever::{Retriever, StaticRetriever};
pub use types::{Document, Generation, ModelResult};
pub use values::{ChainValue, ChainValues};
