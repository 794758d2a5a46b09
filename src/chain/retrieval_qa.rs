//! Retrieval-augmented question answering.
//!
//! ```text
//! {query} ──► Retriever ──► {question, inputDocuments} ──► StuffDocumentsChain ──► LlmChain
//! ```

use super::{
    merge_input_keys, validate_nested, BoxFut, Chain, ChainOptions, LlmChain, StuffDocumentsChain,
};
use crate::callbacks::{Callback, EventData, RunMeta};
use crate::error::{ChainError, CollaboratorKind, Result};
use crate::exec_ctx::ExecCtx;
use crate::memory::Memory;
use crate::model::LanguageModel;
use crate::prompt::DEFAULT_STUFF_QA_PROMPT;
use crate::retriever::Retriever;
use crate::types::Document;
use crate::values::{type_mismatch, ChainValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const CHAIN_TYPE: &str = "retrieval-qa";

/// Settings for a [`RetrievalQa`] chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalQaOptions {
    /// Key holding the query text. Default: `"query"`.
    pub input_key: String,
    /// Attach the retrieved documents to the result.
    pub return_source_documents: bool,
    /// Where the retrieved documents go when returned.
    /// Default: `"sourceDocuments"`.
    pub source_documents_key: String,
}

impl Default for RetrievalQaOptions {
    fn default() -> Self {
        Self {
            input_key: "query".to_string(),
            return_source_documents: false,
            source_documents_key: "sourceDocuments".to_string(),
        }
    }
}

/// Answers a query by retrieving documents and stuffing them into a prompt.
///
/// Each call retrieves once, then runs the document-stuffing chain once with
/// the query as its question. A failed retrieval stops the call before any
/// generation happens.
///
/// # Example
///
/// ```
/// use llm_chains::{Chain, ChainValues, ExecCtx, FakeModel, RetrievalQa, StaticRetriever};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let qa = RetrievalQa::from_model(
///     Arc::new(FakeModel::fixed("42")),
///     Arc::new(StaticRetriever::from_texts(["The answer is 42."])),
/// )?;
/// let answer = qa.run(&ExecCtx::new(), "What is the answer?").await?;
/// assert_eq!(answer, "42");
/// # Ok::<(), llm_chains::ChainError>(())
/// # }).unwrap();
/// ```
pub struct RetrievalQa {
    combine: StuffDocumentsChain,
    retriever: Arc<dyn Retriever>,
    config: RetrievalQaOptions,
    options: ChainOptions,
}

impl RetrievalQa {
    pub fn new(combine: StuffDocumentsChain, retriever: Arc<dyn Retriever>) -> Self {
        Self::new_with(combine, retriever, RetrievalQaOptions::default())
    }

    pub fn new_with(
        combine: StuffDocumentsChain,
        retriever: Arc<dyn Retriever>,
        config: RetrievalQaOptions,
    ) -> Self {
        Self {
            combine,
            retriever,
            config,
            options: ChainOptions::default(),
        }
    }

    /// The standard stack: the default stuff-QA prompt feeding an
    /// [`LlmChain`] with output key `"answer"`, wrapped in a
    /// [`StuffDocumentsChain`].
    pub fn from_model(model: Arc<dyn LanguageModel>, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let llm = LlmChain::from_template(model, DEFAULT_STUFF_QA_PROMPT)?.with_output_key("answer");
        let combine = StuffDocumentsChain::new(Box::new(llm))?;
        Ok(Self::new(combine, retriever))
    }

    pub fn with_config(mut self, config: RetrievalQaOptions) -> Self {
        self.config = config;
        self
    }

    pub fn with_return_source_documents(mut self, enabled: bool) -> Self {
        self.config.return_source_documents = enabled;
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

    pub fn config(&self) -> &RetrievalQaOptions {
        &self.config
    }

    /// One retrieval, bracketed by retriever-start and retriever-end or
    /// retriever-error.
    async fn retrieve(&self, ctx: &ExecCtx, query: &str) -> Result<Vec<Document>> {
        let callbacks = ctx.callbacks();
        let run_id = Uuid::new_v4();
        let parent_run_id = ctx.run_id();

        callbacks
            .notify(
                RunMeta::new(run_id, parent_run_id),
                EventData::RetrieverStart { query },
            )
            .await;

        let outcome = match ctx
            .guard(self.retriever.get_relevant_documents(query))
            .await
        {
            Ok(Ok(documents)) => Ok(documents),
            Ok(Err(err)) => Err(ChainError::collaborator(
                CHAIN_TYPE,
                CollaboratorKind::Retriever,
                err,
            )),
            Err(err) => Err(err),
        };

        let meta = RunMeta::new(run_id, parent_run_id);
        match &outcome {
            Ok(documents) => {
                callbacks
                    .notify(meta, EventData::RetrieverEnd { query, documents })
                    .await
            }
            Err(error) => {
                callbacks
                    .notify(meta, EventData::RetrieverError { query, error })
                    .await
            }
        }
        outcome
    }

    fn supplied_keys(&self) -> [&str; 2] {
        let stuff = self.combine.config();
        [stuff.question_key.as_str(), stuff.documents_key.as_str()]
    }
}

impl Chain for RetrievalQa {
    fn chain_type(&self) -> &str {
        CHAIN_TYPE
    }

    fn input_keys(&self) -> Vec<String> {
        merge_input_keys(
            &[self.config.input_key.as_str()],
            &self.combine,
            &self.supplied_keys(),
        )
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys = self.combine.output_keys();
        if self.config.return_source_documents {
            keys.push(self.config.source_documents_key.clone());
        }
        keys
    }

    fn options(&self) -> &ChainOptions {
        &self.options
    }

    fn validate_types(&self, values: &ChainValues) -> Result<()> {
        if let Some(value) = values.get(&self.config.input_key) {
            if value.as_text().is_none() {
                return Err(type_mismatch(
                    CHAIN_TYPE,
                    &self.config.input_key,
                    "text",
                    value,
                ));
            }
        }
        validate_nested(&self.combine, values, &self.supplied_keys())
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        values: &'a ChainValues,
    ) -> BoxFut<'a, Result<ChainValues>> {
        Box::pin(async move {
            let query = values.text(CHAIN_TYPE, &self.config.input_key)?;

            debug!(chain = CHAIN_TYPE, run_id = ?ctx.run_id(), "Retrieving documents");
            let documents = self.retrieve(ctx, query).await?;
            debug!(
                chain = CHAIN_TYPE,
                run_id = ?ctx.run_id(),
                documents = documents.len(),
                "Assembling answer"
            );

            let stuff = self.combine.config();
            let combine_values = values
                .clone()
                .with(stuff.question_key.clone(), query)
                .with(stuff.documents_key.clone(), documents.clone());
            let out = self.combine.call(ctx, combine_values).await?;

            let mut outputs = out.select(&self.combine.output_keys());
            if self.config.return_source_documents {
                outputs.insert(self.config.source_documents_key.clone(), documents);
            }
            Ok(outputs)
        })
    }
}

impl std::fmt::Debug for RetrievalQa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalQa")
            .field("combine", &self.combine)
            .field("config", &self.config)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{EventKind, FnCallback, ListenerErrorPolicy, RecordingHandler};
    use crate::model::FakeModel;
    use crate::retriever::StaticRetriever;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn joke_docs() -> Vec<Document> {
        vec![
            Document::new("Why don't scientists trust atoms? Because they make up everything."),
            Document::new("Why did the scarecrow win an award? Because he was outstanding in his field."),
        ]
    }

    fn qa(model: Arc<FakeModel>, docs: Vec<Document>) -> RetrievalQa {
        RetrievalQa::from_model(model, Arc::new(StaticRetriever::new(docs))).unwrap()
    }

    fn query() -> ChainValues {
        ChainValues::from([("query", "What is the answer?")])
    }

    fn chain_events(recorder: &RecordingHandler) -> Vec<String> {
        recorder
            .events()
            .into_iter()
            .filter(|e| e.kind.as_str().starts_with("chain"))
            .map(|e| e.to_string())
            .collect()
    }

    /// Fails every retrieval.
    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        async fn get_relevant_documents(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
            anyhow::bail!("index unavailable")
        }
    }

    /// Cancels the shared token, then never finishes.
    struct CancellingRetriever {
        token: CancellationToken,
    }

    #[async_trait]
    impl Retriever for CancellingRetriever {
        async fn get_relevant_documents(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
            self.token.cancel();
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_answer_and_event_sequence() {
        let model = Arc::new(FakeModel::fixed("42"));
        let recorder = Arc::new(RecordingHandler::new());
        let chain = qa(model.clone(), joke_docs());
        let ctx = ExecCtx::builder()
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();

        let out = chain.call(&ctx, query()).await.unwrap();
        assert_eq!(out.text("t", "answer").unwrap(), "42");
        assert_eq!(out.text("t", "query").unwrap(), "What is the answer?");
        assert_eq!(model.calls(), 1);

        assert_eq!(
            chain_events(&recorder),
            vec![
                "chain-start(retrieval-qa)",
                "chain-start(stuff-documents)",
                "chain-start(llm-chain)",
                "chain-end(llm-chain)",
                "chain-end(stuff-documents)",
                "chain-end(retrieval-qa)",
            ]
        );
        assert_eq!(
            recorder.kinds(),
            vec![
                EventKind::ChainStart,
                EventKind::RetrieverStart,
                EventKind::RetrieverEnd,
                EventKind::ChainStart,
                EventKind::ChainStart,
                EventKind::ModelStart,
                EventKind::ModelEnd,
                EventKind::ChainEnd,
                EventKind::ChainEnd,
                EventKind::ChainEnd,
            ]
        );
    }

    #[tokio::test]
    async fn test_every_start_has_one_terminal_with_same_run_id() {
        let recorder = Arc::new(RecordingHandler::new());
        let chain = qa(Arc::new(FakeModel::fixed("42")), joke_docs());
        let ctx = ExecCtx::builder()
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();
        chain.call(&ctx, query()).await.unwrap();

        let events = recorder.events();
        let mut open: HashMap<Uuid, usize> = HashMap::new();
        for (i, event) in events.iter().enumerate() {
            if event.kind.is_start() {
                assert!(open.insert(event.run_id, i).is_none());
            } else {
                let start = open.remove(&event.run_id).expect("terminal without start");
                assert!(start < i);
            }
        }
        assert!(open.is_empty());

        // The call tree: retrieval-qa > {retriever, stuff-documents > llm-chain > model}.
        let top = events[0].run_id;
        assert_eq!(events[0].parent_run_id, None);
        assert_eq!(events[1].parent_run_id, Some(top));
        let stuff = &events[3];
        assert_eq!(stuff.parent_run_id, Some(top));
        let llm = &events[4];
        assert_eq!(llm.parent_run_id, Some(stuff.run_id));
        assert_eq!(events[5].parent_run_id, Some(llm.run_id));
    }

    #[tokio::test]
    async fn test_missing_query_is_silent_and_calls_nothing() {
        let model = Arc::new(FakeModel::fixed("42"));
        let recorder = Arc::new(RecordingHandler::new());
        let chain = qa(model.clone(), joke_docs());
        let ctx = ExecCtx::builder()
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();

        let err = chain
            .call(&ctx, ChainValues::from([("question", "wrong key")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidInput { ref key, .. } if key == "query"));
        assert!(recorder.events().is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_result_is_superset_of_input() {
        let chain = qa(Arc::new(FakeModel::fixed("42")), joke_docs());
        let input = query().with("user", "u-1");
        let out = chain.call(&ExecCtx::new(), input.clone()).await.unwrap();

        for (key, value) in input.iter() {
            assert_eq!(out.get(key), Some(value));
        }
        for key in chain.output_keys() {
            assert!(out.contains_key(&key));
        }
        assert!(out.len() > input.len());
    }

    #[tokio::test]
    async fn test_return_source_documents() {
        let chain = qa(Arc::new(FakeModel::fixed("42")), joke_docs()).with_return_source_documents(true);
        assert_eq!(
            chain.output_keys(),
            vec!["answer".to_string(), "sourceDocuments".to_string()]
        );

        let out = chain.call(&ExecCtx::new(), query()).await.unwrap();
        let docs: Vec<Document> = out.parse_as("sourceDocuments").unwrap();
        assert_eq!(docs, joke_docs());
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_answers() {
        let model = Arc::new(FakeModel::fixed("I don't know"));
        let chain = qa(model.clone(), Vec::new());
        let out = chain.call(&ExecCtx::new(), query()).await.unwrap();
        assert_eq!(out.text("t", "answer").unwrap(), "I don't know");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_retriever_failure_skips_assembly() {
        let model = Arc::new(FakeModel::fixed("42"));
        let recorder = Arc::new(RecordingHandler::new());
        let chain = RetrievalQa::from_model(model.clone(), Arc::new(DownRetriever))
            .unwrap()
            .with_callback(recorder.clone() as Arc<dyn Callback>);

        let err = chain.call(&ExecCtx::new(), query()).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Collaborator {
                collaborator: CollaboratorKind::Retriever,
                ..
            }
        ));
        assert_eq!(model.calls(), 0);
        assert_eq!(
            recorder.kinds(),
            vec![
                EventKind::ChainStart,
                EventKind::RetrieverStart,
                EventKind::RetrieverError,
                EventKind::ChainError,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_retrieval() {
        let token = CancellationToken::new();
        let model = Arc::new(FakeModel::fixed("42"));
        let recorder = Arc::new(RecordingHandler::new());
        let chain = RetrievalQa::from_model(
            model.clone(),
            Arc::new(CancellingRetriever {
                token: token.clone(),
            }),
        )
        .unwrap();
        let ctx = ExecCtx::builder()
            .cancellation(token)
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();

        let err = chain.call(&ctx, query()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(model.calls(), 0);
        assert_eq!(
            recorder.trace(),
            vec![
                "chain-start(retrieval-qa)",
                "retriever-start(What is the answer?)",
                "retriever-error(What is the answer?)",
                "chain-error(retrieval-qa)",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_listener_on_model_end_does_not_starve_others() {
        let failing: Arc<dyn Callback> = Arc::new(
            FnCallback::new("picky", |event: &crate::callbacks::Event<'_>| {
                if event.kind() == EventKind::ModelEnd {
                    anyhow::bail!("cannot handle model-end");
                }
                Ok(())
            })
            .with_always_verbose(true),
        );
        let recorder = Arc::new(RecordingHandler::new());
        let ctx = ExecCtx::builder()
            .callbacks(vec![failing, recorder.clone() as Arc<dyn Callback>])
            .build();

        let out = qa(Arc::new(FakeModel::fixed("42")), joke_docs())
            .call(&ctx, query())
            .await
            .unwrap();
        assert_eq!(out.text("t", "answer").unwrap(), "42");
        assert!(recorder.kinds().contains(&EventKind::ModelEnd));
    }

    #[tokio::test]
    async fn test_collected_listener_errors_carry_result() {
        let failing: Arc<dyn Callback> = Arc::new(
            FnCallback::new("picky", |event: &crate::callbacks::Event<'_>| {
                if event.kind() == EventKind::ModelEnd {
                    anyhow::bail!("cannot handle model-end");
                }
                Ok(())
            })
            .with_always_verbose(true),
        );
        let ctx = ExecCtx::builder()
            .callback(failing)
            .listener_errors(ListenerErrorPolicy::Collect)
            .build();

        let err = qa(Arc::new(FakeModel::fixed("42")), joke_docs())
            .call(&ctx, query())
            .await
            .unwrap_err();
        let ChainError::Listener { errors, values } = err else {
            panic!("expected listener error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].listener, "picky");
        assert_eq!(errors[0].event, EventKind::ModelEnd);
        assert_eq!(values.text("t", "answer").unwrap(), "42");
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_chain() {
        let model = Arc::new(FakeModel::fixed("42"));
        let recorder = Arc::new(RecordingHandler::new());
        let chain = qa(model.clone(), joke_docs());
        let ctx = ExecCtx::builder()
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();

        let calls = (0..4).map(|i| {
            chain.call(
                &ctx,
                ChainValues::from([("query", format!("question {i}"))]),
            )
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(model.calls(), 4);
        let top_runs: std::collections::HashSet<_> = recorder
            .events()
            .into_iter()
            .filter(|e| e.parent_run_id.is_none())
            .map(|e| e.run_id)
            .collect();
        assert_eq!(top_runs.len(), 4);
    }

    #[test]
    fn test_keys_and_config() {
        let chain = qa(Arc::new(FakeModel::fixed("42")), Vec::new());
        assert_eq!(chain.input_keys(), vec!["query".to_string()]);
        assert_eq!(chain.output_keys(), vec!["answer".to_string()]);

        let config: RetrievalQaOptions =
            serde_json::from_str(r#"{"input_key": "q", "return_source_documents": true}"#).unwrap();
        assert_eq!(config.source_documents_key, "sourceDocuments");
        let chain = chain.with_config(config);
        assert_eq!(chain.input_keys(), vec!["q".to_string()]);
        assert_eq!(chain.output_keys().len(), 2);
    }

    /// Cancels the shared token from inside generation, then never finishes.
    struct CancellingModel {
        token: CancellationToken,
    }

    #[async_trait]
    impl LanguageModel for CancellingModel {
        async fn generate(
            &self,
            _prompts: &[String],
            _options: &crate::model::GenerateOptions,
        ) -> anyhow::Result<crate::types::ModelResult> {
            self.token.cancel();
            tokio::time::sleep(Duration::from_secs(60)).await;
            anyhow::bail!("unreachable")
        }

        fn model_type(&self) -> &str {
            "llm.Cancelling"
        }
    }

    /// Supplies a fixed `history` value and counts saves.
    #[derive(Default)]
    struct History {
        saves: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Memory for History {
        fn memory_keys(&self) -> Vec<String> {
            vec!["history".into()]
        }

        async fn load(&self, _values: &ChainValues) -> anyhow::Result<ChainValues> {
            Ok(ChainValues::from([("history", "Q: hi A: hello")]))
        }

        async fn save(&self, _inputs: &ChainValues, _outputs: &ChainValues) -> anyhow::Result<()> {
            self.saves
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    /// Counts retrievals.
    #[derive(Default)]
    struct CountingRetriever {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        async fn get_relevant_documents(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(joke_docs())
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_generation_unwinds_every_chain() {
        let token = CancellationToken::new();
        let recorder = Arc::new(RecordingHandler::new());
        let chain = RetrievalQa::from_model(
            Arc::new(CancellingModel {
                token: token.clone(),
            }),
            Arc::new(StaticRetriever::new(joke_docs())),
        )
        .unwrap();
        let ctx = ExecCtx::builder()
            .cancellation(token)
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();

        let err = chain.call(&ctx, query()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(
            recorder.trace(),
            vec![
                "chain-start(retrieval-qa)",
                "retriever-start(What is the answer?)",
                "retriever-end(What is the answer?)",
                "chain-start(stuff-documents)",
                "chain-start(llm-chain)",
                "model-start(llm.Cancelling)",
                "model-error(llm.Cancelling)",
                "chain-error(llm-chain)",
                "chain-error(stuff-documents)",
                "chain-error(retrieval-qa)",
            ]
        );
    }

    #[tokio::test]
    async fn test_nested_type_mismatch_fails_before_retrieval() {
        let retriever = Arc::new(CountingRetriever::default());
        let model = Arc::new(FakeModel::fixed("42"));
        let llm = LlmChain::from_template(model.clone(), "{context} {question} {lang}").unwrap();
        let combine = StuffDocumentsChain::new(Box::new(llm)).unwrap();
        let chain = RetrievalQa::new(combine, retriever.clone());
        assert_eq!(
            chain.input_keys(),
            vec!["query".to_string(), "lang".to_string()]
        );

        let recorder = Arc::new(RecordingHandler::new());
        let ctx = ExecCtx::builder()
            .callback(recorder.clone() as Arc<dyn Callback>)
            .build();
        let values = query().with("lang", joke_docs());

        let err = chain.call(&ctx, values).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::InputTypeMismatch { ref key, .. } if key == "lang"
        ));
        assert_eq!(retriever.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(model.calls(), 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_memory_on_nested_llm_chain() {
        let memory = Arc::new(History::default());
        let model = Arc::new(FakeModel::fixed("42"));
        let llm = LlmChain::from_template(model.clone(), "{history}\n{context}\n{question}")
            .unwrap()
            .with_memory(memory.clone() as Arc<dyn Memory>);
        let combine = StuffDocumentsChain::new(Box::new(llm)).unwrap();
        let chain = RetrievalQa::new(combine, Arc::new(StaticRetriever::new(joke_docs())));
        assert_eq!(chain.input_keys(), vec!["query".to_string()]);

        let out = chain.call(&ExecCtx::new(), query()).await.unwrap();
        assert_eq!(out.text("t", "text").unwrap(), "42");
        assert_eq!(model.calls(), 1);
        assert_eq!(memory.saves.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_must_be_text() {
        let chain = qa(Arc::new(FakeModel::fixed("42")), Vec::new());
        let values = ChainValues::new().with("query", joke_docs());
        let err = chain.call(&ExecCtx::new(), values).await.unwrap_err();
        assert!(matches!(err, ChainError::InputTypeMismatch { expected: "text", .. }));
    }
}
