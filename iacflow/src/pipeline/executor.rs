//! Sequential pipeline execution.

use super::{PipelineResult, PipelineRun, StageDefinition, StageOutcome};
use crate::annotations::{AnnotationSink, NoOpAnnotationSink};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    AdapterOutput, Annotation, AnnotationTarget, Artifact, FailurePolicy, OverallStatus,
    StageStatus,
};
use crate::credentials::{CredentialProvider, EnvCredentialProvider};
use crate::errors::AdapterError;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::observability;
use crate::stages::StageContext;
use crate::utils;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Runs configured pipelines.
///
/// The orchestrator owns the side channels (annotation sink, event sink,
/// credentials); a [`PipelineRun`] owns only the stage sequence. One
/// orchestrator can execute any number of runs. Cancellation is scoped to a
/// single run, see [`Orchestrator::execute_with_cancellation`].
pub struct Orchestrator {
    annotation_sink: Arc<dyn AnnotationSink>,
    event_sink: Arc<dyn EventSink>,
    credentials: Arc<dyn CredentialProvider>,
    annotation_targets: BTreeSet<AnnotationTarget>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("annotation_targets", &self.annotation_targets)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator that discards annotations and events,
    /// resolves secrets from the process environment and allows every
    /// annotation target.
    #[must_use]
    pub fn new() -> Self {
        Self {
            annotation_sink: Arc::new(NoOpAnnotationSink),
            event_sink: Arc::new(NoOpEventSink),
            credentials: Arc::new(EnvCredentialProvider),
            annotation_targets: [
                AnnotationTarget::PullRequest,
                AnnotationTarget::SecurityReport,
                AnnotationTarget::ArtifactStore,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Creates an orchestrator whose annotation gating follows `config`.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new().with_annotation_targets(config.annotation_targets())
    }

    /// Sets the annotation sink.
    #[must_use]
    pub fn with_annotation_sink(mut self, sink: Arc<dyn AnnotationSink>) -> Self {
        self.annotation_sink = sink;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the credential provider handed to adapters.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Restricts which annotation targets are delivered.
    #[must_use]
    pub fn with_annotation_targets(
        mut self,
        targets: impl IntoIterator<Item = AnnotationTarget>,
    ) -> Self {
        self.annotation_targets = targets.into_iter().collect();
        self
    }

    /// Executes `run` stage by stage and returns its terminal result.
    ///
    /// Never fails: adapter failures are folded into the result according
    /// to each stage's failure policy. The run cannot be cancelled.
    pub async fn execute(&self, run: &PipelineRun) -> PipelineResult {
        self.execute_with_cancellation(run, &CancellationToken::new())
            .await
    }

    /// Executes `run`, aborting the remaining stages once `cancellation` is
    /// set.
    ///
    /// The token is checked between stages only. It belongs to this run:
    /// later runs on the same orchestrator are unaffected unless they are
    /// given the same token.
    #[instrument(skip_all, fields(environment = %run.environment()))]
    pub async fn execute_with_cancellation(
        &self,
        run: &PipelineRun,
        cancellation: &CancellationToken,
    ) -> PipelineResult {
        let run_id = utils::generate_run_id();
        info!(%run_id, stages = run.stages().len(), enabled = run.enabled_count(), "pipeline started");
        self.event_sink
            .emit(
                event_types::PIPELINE_STARTED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "environment": run.environment(),
                    "stages": run.stage_names(),
                    "timestamp": utils::iso_timestamp(),
                })),
            )
            .await;

        let mut artifacts: BTreeMap<String, Artifact> = BTreeMap::new();
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(run.stages().len());
        let mut halted_by: Option<String> = None;
        let mut cancelled: Option<String> = None;

        for stage in run.stages() {
            if let Some(failed_stage) = &halted_by {
                self.skip(stage, StageStatus::Halted, failed_stage, &mut outcomes)
                    .await;
                continue;
            }

            if cancelled.is_none() && cancellation.is_cancelled() {
                let reason = cancellation
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                warn!(stage = %stage.name, reason = %reason, "pipeline cancelled");
                self.event_sink
                    .emit(
                        event_types::PIPELINE_CANCELLED,
                        Some(json!({
                            "run_id": run_id.to_string(),
                            "reason": reason,
                            "next_stage": stage.name,
                        })),
                    )
                    .await;
                cancelled = Some(reason);
            }
            if let Some(reason) = &cancelled {
                self.skip(stage, StageStatus::Cancelled, reason, &mut outcomes)
                    .await;
                continue;
            }

            if !stage.enabled {
                self.skip(stage, StageStatus::Disabled, "disabled", &mut outcomes)
                    .await;
                continue;
            }

            let (outcome, artifact) = self.run_stage(run, stage, &artifacts).await;
            if let Some(artifact) = artifact {
                artifacts.insert(stage.name.clone(), artifact);
            }
            if outcome.failed() {
                match stage.on_failure {
                    FailurePolicy::HardFail => {
                        error!(stage = %stage.name, policy = %stage.on_failure, "hard failure, halting pipeline");
                        halted_by = Some(stage.name.clone());
                    }
                    FailurePolicy::SoftFail => {
                        warn!(stage = %stage.name, policy = %stage.on_failure, "soft failure, continuing");
                    }
                    FailurePolicy::ReportOnly => {
                        info!(stage = %stage.name, policy = %stage.on_failure, "report-only failure, continuing");
                    }
                }
            }
            outcomes.push(outcome);
        }

        let overall_status =
            OverallStatus::from_failures(outcomes.iter().filter(|o| o.failed()).map(|o| o.policy));
        let result = PipelineResult {
            environment: run.environment().to_string(),
            overall_status,
            outcomes,
            artifacts,
            cancelled,
        };
        let summary = observability::run_summary(&result);
        info!(%run_id, summary = %summary, "pipeline completed");
        self.event_sink
            .emit(
                event_types::PIPELINE_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "status": result.overall_status,
                    "cancelled": result.cancelled,
                    "summary": summary,
                    "timestamp": utils::iso_timestamp(),
                })),
            )
            .await;
        result
    }

    async fn skip(
        &self,
        stage: &StageDefinition,
        status: StageStatus,
        reason: &str,
        outcomes: &mut Vec<StageOutcome>,
    ) {
        debug!(stage = %stage.name, %status, reason, "stage skipped");
        self.event_sink
            .emit(
                event_types::STAGE_SKIPPED,
                Some(json!({ "stage": stage.name, "status": status, "reason": reason })),
            )
            .await;
        outcomes.push(StageOutcome::not_run(&stage.name, stage.on_failure, status));
    }

    /// Invokes one enabled stage and classifies its output.
    #[instrument(skip_all, fields(stage = %stage.name, policy = %stage.on_failure, adapter = stage.adapter.kind()))]
    async fn run_stage(
        &self,
        run: &PipelineRun,
        stage: &StageDefinition,
        artifacts: &BTreeMap<String, Artifact>,
    ) -> (StageOutcome, Option<Artifact>) {
        self.event_sink
            .emit(
                event_types::STAGE_STARTED,
                Some(json!({
                    "stage": stage.name,
                    "adapter": stage.adapter.kind(),
                    "version": stage.adapter.version(),
                })),
            )
            .await;

        let start = Instant::now();
        let output = {
            let mut ctx = StageContext::new(
                &stage.name,
                run.environment(),
                &stage.inputs,
                self.credentials.as_ref(),
            )
            .with_secret_names(&stage.secrets)
            .with_timeout(stage.timeout);
            for producer in &stage.consumes {
                ctx = ctx.with_artifact(producer, artifacts.get(producer));
            }

            match stage.timeout {
                Some(timeout) => tokio::time::timeout(timeout, stage.adapter.execute(&ctx))
                    .await
                    .unwrap_or_else(|_elapsed| AdapterOutput::timed_out(timeout)),
                None => stage.adapter.execute(&ctx).await,
            }
        };
        let duration_ms = utils::duration_ms(start.elapsed());

        let AdapterOutput {
            failure,
            timed_out_after,
            artifact,
            findings,
            cost,
            diagnostics,
            annotations,
        } = output;

        let error = failure.map(|message| match timed_out_after {
            Some(timeout) => AdapterError::timeout(&stage.name, timeout),
            None => AdapterError::failure(&stage.name, message),
        });
        let status = if error.is_some() {
            StageStatus::Failed
        } else {
            StageStatus::Succeeded
        };

        let recorded = record_artifact(stage, status, artifact);
        let annotations_delivered = self.forward_annotations(&stage.name, annotations).await;

        match &error {
            Some(err) => {
                warn!(error = %err, duration_ms, "stage failed");
                self.event_sink
                    .emit(
                        event_types::STAGE_FAILED,
                        Some(json!({
                            "stage": stage.name,
                            "policy": stage.on_failure,
                            "error": err.to_string(),
                            "timed_out": err.is_timeout(),
                            "duration_ms": duration_ms,
                        })),
                    )
                    .await;
            }
            None => {
                info!(duration_ms, findings = findings.len(), "stage succeeded");
                self.event_sink
                    .emit(
                        event_types::STAGE_COMPLETED,
                        Some(json!({
                            "stage": stage.name,
                            "artifact": recorded.is_some(),
                            "findings": findings.len(),
                            "duration_ms": duration_ms,
                        })),
                    )
                    .await;
            }
        }

        let outcome = StageOutcome {
            name: stage.name.clone(),
            status,
            policy: stage.on_failure,
            error,
            findings,
            cost,
            diagnostics,
            annotations_delivered,
        };
        (outcome, recorded)
    }

    /// Delivers annotations that pass target gating. Delivery errors are
    /// logged and never change the stage result.
    async fn forward_annotations(&self, stage: &str, annotations: Vec<Annotation>) -> usize {
        let mut delivered = 0;
        for annotation in annotations {
            let annotation = annotation.for_stage(stage);
            if !self.annotation_targets.contains(&annotation.target) {
                debug!(target = %annotation.target, title = %annotation.title, "annotation target disabled");
                continue;
            }
            match self.annotation_sink.deliver(&annotation).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(error = %e, "annotation delivery failed"),
            }
        }
        delivered
    }
}

/// Keeps the adapter's artifact only for a successful declared producer.
fn record_artifact(
    stage: &StageDefinition,
    status: StageStatus,
    artifact: Option<serde_json::Value>,
) -> Option<Artifact> {
    match (&stage.produces, status, artifact) {
        (Some(label), StageStatus::Succeeded, Some(data)) => {
            let mut artifact = Artifact::new(&stage.name, label, data)
                .with_metadata("adapter", json!(stage.adapter.kind()));
            if let Some(version) = stage.adapter.version() {
                artifact = artifact.with_metadata("version", json!(version));
            }
            Some(artifact)
        }
        (Some(_), StageStatus::Succeeded, None) => {
            warn!(stage = %stage.name, "producer stage returned no artifact");
            None
        }
        (None, _, Some(_)) => {
            warn!(stage = %stage.name, "stage declares no artifact, discarding output");
            None
        }
        (Some(_), _, Some(_)) => {
            warn!(stage = %stage.name, "failed stage artifact discarded");
            None
        }
        _ => None,
    }
}
