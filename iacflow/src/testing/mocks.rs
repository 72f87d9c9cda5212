//! Mock adapters and sinks for testing pipelines.

use crate::annotations::AnnotationSink;
use crate::core::{AdapterOutput, Annotation};
use crate::errors::AnnotationError;
use crate::stages::{StageAdapter, StageContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// One recorded invocation of a [`MockAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Stage name from the context.
    pub stage: String,
    /// Environment from the context.
    pub environment: String,
    /// Declared upstream artifacts, `None` where the slot was absent.
    pub artifacts: BTreeMap<String, Option<serde_json::Value>>,
}

/// A configurable mock adapter.
///
/// Returns a fixed output (optionally after a delay) and records every call.
#[derive(Debug)]
pub struct MockAdapter {
    kind: String,
    output: Mutex<AdapterOutput>,
    delay: Option<Duration>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockAdapter {
    /// Creates a mock returning `output`.
    #[must_use]
    pub fn new(output: AdapterOutput) -> Self {
        Self {
            kind: "mock".to_string(),
            output: Mutex::new(output),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that succeeds with nothing attached.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(AdapterOutput::success())
    }

    /// Creates a mock that fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(AdapterOutput::failure(message))
    }

    /// Creates a mock that succeeds with an artifact payload.
    #[must_use]
    pub fn with_artifact(artifact: serde_json::Value) -> Self {
        Self::new(AdapterOutput::with_artifact_value(artifact))
    }

    /// Creates a mock that sleeps for `delay` before succeeding.
    #[must_use]
    pub fn slow(delay: Duration) -> Self {
        Self::succeeding().with_delay(delay)
    }

    /// Sleeps for `delay` before returning.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the output returned by later calls.
    pub fn set_output(&self, output: AdapterOutput) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the adapter was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StageAdapter for MockAdapter {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let artifacts = ctx
            .declared_producers()
            .into_iter()
            .map(|producer| {
                let data = ctx.artifact(producer).available().map(|a| a.data.clone());
                (producer.to_string(), data)
            })
            .collect();
        self.calls.lock().push(MockCall {
            stage: ctx.stage().to_string(),
            environment: ctx.environment().to_string(),
            artifacts,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.output.lock().clone()
    }
}

/// Invocation order shared by several [`RecordingAdapter`]s.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded stage names, in invocation order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    fn push(&self, stage: &str) {
        self.entries.lock().push(stage.to_string());
    }
}

/// An adapter that appends its stage name to a shared [`ExecutionLog`].
#[derive(Debug)]
pub struct RecordingAdapter {
    log: ExecutionLog,
    output: AdapterOutput,
}

impl RecordingAdapter {
    /// Creates a recording adapter that succeeds.
    #[must_use]
    pub fn new(log: &ExecutionLog) -> Self {
        Self::returning(log, AdapterOutput::success())
    }

    /// Creates a recording adapter that returns `output`.
    #[must_use]
    pub fn returning(log: &ExecutionLog, output: AdapterOutput) -> Self {
        Self {
            log: log.clone(),
            output,
        }
    }
}

#[async_trait]
impl StageAdapter for RecordingAdapter {
    fn kind(&self) -> &str {
        "recording"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        self.log.push(ctx.stage());
        self.output.clone()
    }
}

/// An annotation sink that rejects every delivery.
#[derive(Debug, Clone, Default)]
pub struct RejectingAnnotationSink {
    attempts: Arc<Mutex<usize>>,
}

impl RejectingAnnotationSink {
    /// Creates a new rejecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rejected deliveries.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl AnnotationSink for RejectingAnnotationSink {
    async fn deliver(&self, annotation: &Annotation) -> Result<(), AnnotationError> {
        *self.attempts.lock() += 1;
        Err(AnnotationError::new(
            &annotation.stage,
            annotation.target.to_string(),
            "sink unavailable",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Artifact;
    use crate::credentials::StaticCredentialProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_adapter_records_calls() {
        let adapter = MockAdapter::succeeding();
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let plan = Artifact::new("plan", "plan", json!({"plan_file": "dev.tfplan"}));
        let ctx = StageContext::new("apply", "dev", &inputs, &credentials)
            .with_artifact("plan", Some(&plan))
            .with_artifact("lint", None);

        assert!(adapter.execute(&ctx).await.is_success());
        adapter.set_output(AdapterOutput::failure("boom"));
        assert!(!adapter.execute(&ctx).await.is_success());

        assert_eq!(adapter.call_count(), 2);
        let call = &adapter.calls()[0];
        assert_eq!(call.stage, "apply");
        assert_eq!(call.artifacts.get("plan"), Some(&Some(json!({"plan_file": "dev.tfplan"}))));
        assert_eq!(call.artifacts.get("lint"), Some(&None));
    }

    #[tokio::test]
    async fn test_recording_adapters_share_log() {
        let log = ExecutionLog::new();
        let first = RecordingAdapter::new(&log);
        let second = RecordingAdapter::returning(&log, AdapterOutput::failure("nope"));
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();

        first
            .execute(&StageContext::new("a", "dev", &inputs, &credentials))
            .await;
        let output = second
            .execute(&StageContext::new("b", "dev", &inputs, &credentials))
            .await;

        assert!(!output.is_success());
        assert_eq!(log.entries(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rejecting_sink() {
        let sink = RejectingAnnotationSink::new();
        let err = sink
            .deliver(&Annotation::pr_comment("Plan", "ok").for_stage("plan"))
            .await
            .unwrap_err();
        assert_eq!(err.target, "pull_request");
        assert_eq!(sink.attempts(), 1);
    }
}
