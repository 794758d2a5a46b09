//! Request tracking for external telemetry services.
//!
//! [`TrackingHandler`] pairs each model-start with its model-end by run id,
//! times the request, and hands one [`TrackedRequest`] per generation group
//! to a [`RequestTracker`]. The tracker owns the transport; this module only
//! correlates and shapes the record.

use super::{Callback, RunMeta};
use crate::error::ChainError;
use crate::types::ModelResult;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One completed model request, ready to ship to a telemetry backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedRequest {
    pub run_id: Uuid,
    pub model_type: String,
    pub prompt: String,
    pub invocation_params: Map<String, Value>,
    /// Top candidate of the generation group.
    pub text: String,
    pub info: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl TrackedRequest {
    /// Wall-clock time between model-start and model-end.
    pub fn latency(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Sink for tracked requests, typically a client for a prompt-tracking API.
#[async_trait]
pub trait RequestTracker: Send + Sync {
    /// Record one request. The returned value is passed to the
    /// [`TrackingHandler`]'s `on_tracked` hook.
    async fn track(&self, request: TrackedRequest) -> anyhow::Result<Value>;
}

/// Settings for a [`TrackingHandler`].
#[derive(Debug, Clone, Default)]
pub struct TrackingOptions {
    /// Attach this prompt id to every request. Only valid for single-prompt
    /// model calls.
    pub prompt_id: Option<String>,
    pub tags: Vec<String>,
    /// Model types this handler accepts. Empty accepts all.
    pub model_types: Vec<String>,
}

impl TrackingOptions {
    pub fn with_prompt_id(mut self, prompt_id: impl Into<String>) -> Self {
        self.prompt_id = Some(prompt_id.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_types.push(model_type.into());
        self
    }
}

#[derive(Debug)]
struct PendingRequest {
    prompts: Vec<String>,
    invocation_params: Map<String, Value>,
    started_at: DateTime<Utc>,
}

type TrackedHook = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Always-verbose listener that forwards model requests to a
/// [`RequestTracker`].
///
/// Failures (unsupported model, a prompt id on a multi-prompt call, a
/// model-end without a recorded start, tracker errors) surface as listener
/// errors and never abort the chain. A run refused at model-start is
/// reported once; its model-end is skipped.
pub struct TrackingHandler<T> {
    tracker: T,
    options: TrackingOptions,
    runs: Mutex<HashMap<Uuid, PendingRequest>>,
    /// Runs refused at model-start. Their model-end is ignored.
    rejected: Mutex<HashSet<Uuid>>,
    on_tracked: Option<TrackedHook>,
}

impl<T: RequestTracker> TrackingHandler<T> {
    pub fn new(tracker: T) -> Self {
        Self::with_options(tracker, TrackingOptions::default())
    }

    pub fn with_options(tracker: T, options: TrackingOptions) -> Self {
        Self {
            tracker,
            options,
            runs: Mutex::new(HashMap::new()),
            rejected: Mutex::new(HashSet::new()),
            on_tracked: None,
        }
    }

    /// Called with the tracker's response after each tracked request.
    pub fn on_tracked<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_tracked = Some(Arc::new(f));
        self
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Number of model runs started but not yet ended.
    pub fn pending(&self) -> usize {
        self.runs.lock().len()
    }
}

#[async_trait]
impl<T: RequestTracker> Callback for TrackingHandler<T> {
    fn name(&self) -> &str {
        "tracking"
    }

    fn always_verbose(&self) -> bool {
        true
    }

    async fn on_model_start(
        &self,
        run: &RunMeta,
        model_type: &str,
        prompts: &[String],
        invocation_params: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        let refusal = if self.options.prompt_id.is_some() && prompts.len() != 1 {
            Some(anyhow!(
                "prompt id assignment only possible with a single prompt, got {}",
                prompts.len()
            ))
        } else if !self.options.model_types.is_empty()
            && !self.options.model_types.iter().any(|t| t == model_type)
        {
            Some(anyhow!(
                "model type '{}' is not supported for tracking",
                model_type
            ))
        } else {
            None
        };
        if let Some(err) = refusal {
            self.rejected.lock().insert(run.run_id);
            return Err(err);
        }

        self.runs.lock().insert(
            run.run_id,
            PendingRequest {
                prompts: prompts.to_vec(),
                invocation_params: invocation_params.clone(),
                started_at: run.timestamp,
            },
        );
        Ok(())
    }

    async fn on_model_end(
        &self,
        run: &RunMeta,
        model_type: &str,
        result: &ModelResult,
    ) -> anyhow::Result<()> {
        if self.rejected.lock().remove(&run.run_id) {
            return Ok(());
        }
        let pending = self
            .runs
            .lock()
            .remove(&run.run_id)
            .ok_or_else(|| anyhow!("no pending request for run {}", run.run_id))?;

        for (i, group) in result.generations.iter().enumerate() {
            let Some(top) = group.first() else {
                continue;
            };
            let prompt = pending
                .prompts
                .get(i)
                .or_else(|| pending.prompts.first())
                .cloned()
                .unwrap_or_default();

            let request = TrackedRequest {
                run_id: run.run_id,
                model_type: model_type.to_string(),
                prompt,
                invocation_params: pending.invocation_params.clone(),
                text: top.text.clone(),
                info: top.info.clone(),
                prompt_id: self.options.prompt_id.clone(),
                tags: self.options.tags.clone(),
                started_at: pending.started_at,
                ended_at: run.timestamp,
            };
            let response = self.tracker.track(request).await?;
            debug!(run_id = %run.run_id, model_type, "Tracked model request");

            if let Some(hook) = &self.on_tracked {
                hook(&response)?;
            }
        }
        Ok(())
    }

    async fn on_model_error(
        &self,
        run: &RunMeta,
        _model_type: &str,
        _error: &ChainError,
    ) -> anyhow::Result<()> {
        self.runs.lock().remove(&run.run_id);
        self.rejected.lock().remove(&run.run_id);
        Ok(())
    }
}

impl<T> std::fmt::Debug for TrackingHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingHandler")
            .field("options", &self.options)
            .field("pending", &self.runs.lock().len())
            .field("on_tracked", &self.on_tracked.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Generation;
    use serde_json::json;

    #[derive(Default)]
    struct MemoryTracker {
        requests: Mutex<Vec<TrackedRequest>>,
    }

    #[async_trait]
    impl RequestTracker for MemoryTracker {
        async fn track(&self, request: TrackedRequest) -> anyhow::Result<Value> {
            let mut requests = self.requests.lock();
            requests.push(request);
            Ok(json!({ "request_id": requests.len() }))
        }
    }

    fn result(texts: &[&str]) -> ModelResult {
        ModelResult {
            generations: texts
                .iter()
                .map(|t| vec![Generation::new(*t)])
                .collect(),
            llm_output: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_tracks_each_generation_group() {
        let handler = TrackingHandler::with_options(
            MemoryTracker::default(),
            TrackingOptions::default().with_tag("qa"),
        );
        let run_id = Uuid::new_v4();
        let prompts = vec!["p1".to_string(), "p2".to_string()];
        let mut params = Map::new();
        params.insert("model".into(), json!("fake"));

        handler
            .on_model_start(&RunMeta::new(run_id, None), "llm.Fake", &prompts, &params)
            .await
            .unwrap();
        assert_eq!(handler.pending(), 1);

        handler
            .on_model_end(&RunMeta::new(run_id, None), "llm.Fake", &result(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(handler.pending(), 0);

        let requests = handler.tracker().requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].prompt, "p1");
        assert_eq!(requests[1].prompt, "p2");
        assert_eq!(requests[1].text, "b");
        assert_eq!(requests[0].tags, vec!["qa".to_string()]);
        assert_eq!(requests[0].invocation_params["model"], json!("fake"));
        assert!(requests[0].latency() >= chrono::Duration::zero());
    }

    #[tokio::test]
    async fn test_model_end_without_start_fails() {
        let handler = TrackingHandler::new(MemoryTracker::default());
        let err = handler
            .on_model_end(&RunMeta::new(Uuid::new_v4(), None), "llm.Fake", &result(&["a"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no pending request"));
    }

    #[tokio::test]
    async fn test_prompt_id_requires_single_prompt() {
        let handler = TrackingHandler::with_options(
            MemoryTracker::default(),
            TrackingOptions::default().with_prompt_id("prompt-7"),
        );
        let prompts = vec!["a".to_string(), "b".to_string()];
        let err = handler
            .on_model_start(
                &RunMeta::new(Uuid::new_v4(), None),
                "llm.Fake",
                &prompts,
                &Map::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("single prompt"));
        assert_eq!(handler.pending(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_model_type() {
        let handler = TrackingHandler::with_options(
            MemoryTracker::default(),
            TrackingOptions::default().with_model_type("llm.OpenAI"),
        );
        let err = handler
            .on_model_start(
                &RunMeta::new(Uuid::new_v4(), None),
                "llm.Fake",
                &["p".to_string()],
                &Map::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("llm.Fake"));
    }

    #[tokio::test]
    async fn test_rejected_run_reports_once() {
        let handler = TrackingHandler::with_options(
            MemoryTracker::default(),
            TrackingOptions::default().with_model_type("llm.OpenAI"),
        );
        let run = RunMeta::new(Uuid::new_v4(), None);
        assert!(handler
            .on_model_start(&run, "llm.Fake", &["p".to_string()], &Map::new())
            .await
            .is_err());

        handler
            .on_model_end(&run, "llm.Fake", &result(&["a"]))
            .await
            .unwrap();
        assert!(handler.tracker().requests.lock().is_empty());

        // The marker is consumed: a second end for the same run is unpaired.
        assert!(handler
            .on_model_end(&run, "llm.Fake", &result(&["a"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_model_error_discards_pending_run() {
        let handler = TrackingHandler::new(MemoryTracker::default());
        let run = RunMeta::new(Uuid::new_v4(), None);
        handler
            .on_model_start(&run, "llm.Fake", &["p".to_string()], &Map::new())
            .await
            .unwrap();
        handler
            .on_model_error(&run, "llm.Fake", &ChainError::Cancelled)
            .await
            .unwrap();
        assert_eq!(handler.pending(), 0);
    }

    #[tokio::test]
    async fn test_on_tracked_hook_sees_response() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = TrackingHandler::new(MemoryTracker::default()).on_tracked(move |resp| {
            sink.lock().push(resp.clone());
            Ok(())
        });
        let run = RunMeta::new(Uuid::new_v4(), None);
        handler
            .on_model_start(&run, "llm.Fake", &["p".to_string()], &Map::new())
            .await
            .unwrap();
        handler
            .on_model_end(&run, "llm.Fake", &result(&["42"]))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![json!({ "request_id": 1 })]);
    }
}
