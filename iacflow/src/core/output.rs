//! The value an adapter hands back to the orchestrator.

use super::{Annotation, CostEstimate, ScanFinding};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The output of one adapter invocation.
///
/// Failures carry the same report data as successes: a scanner that fails
/// because of findings still returns those findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdapterOutput {
    /// Failure description, `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Set when the adapter's tool exceeded its timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out_after: Option<Duration>,

    /// Artifact payload for downstream stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,

    /// Scan findings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<ScanFinding>,

    /// Cost estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostEstimate>,

    /// Tool diagnostics (trimmed stderr/stdout).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,

    /// Annotations to deliver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl AdapterOutput {
    /// Creates a successful output with nothing attached.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a failed output.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates a failed output for a tool that ran out of time.
    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            failure: Some(format!("timed out after {}s", timeout.as_secs_f64())),
            timed_out_after: Some(timeout),
            ..Self::default()
        }
    }

    /// Creates a successful output carrying an artifact.
    #[must_use]
    pub fn with_artifact_value(artifact: serde_json::Value) -> Self {
        Self::success().with_artifact(artifact)
    }

    /// Attaches an artifact payload.
    #[must_use]
    pub fn with_artifact(mut self, artifact: serde_json::Value) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Attaches scan findings.
    #[must_use]
    pub fn with_findings(mut self, findings: Vec<ScanFinding>) -> Self {
        self.findings = findings;
        self
    }

    /// Attaches a cost estimate.
    #[must_use]
    pub fn with_cost(mut self, cost: CostEstimate) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Attaches tool diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Returns true if the adapter succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;

    #[test]
    fn test_success_output() {
        let output = AdapterOutput::with_artifact_value(serde_json::json!({"plan_file": "p"}))
            .with_diagnostics("Plan: 1 to add");
        assert!(output.is_success());
        assert!(output.artifact.is_some());
        assert_eq!(output.diagnostics, "Plan: 1 to add");
    }

    #[test]
    fn test_failure_keeps_findings() {
        let output = AdapterOutput::failure("1 critical finding").with_findings(vec![
            ScanFinding::new(Severity::Critical, "r1", "open bucket", "s3.tf:4"),
        ]);
        assert!(!output.is_success());
        assert_eq!(output.findings.len(), 1);
    }

    #[test]
    fn test_timed_out() {
        let output = AdapterOutput::timed_out(Duration::from_secs(2));
        assert!(!output.is_success());
        assert_eq!(output.timed_out_after, Some(Duration::from_secs(2)));
        assert_eq!(output.failure.as_deref(), Some("timed out after 2s"));
    }

    #[test]
    fn test_serialization_skips_empty() {
        let json = serde_json::to_value(AdapterOutput::success()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
