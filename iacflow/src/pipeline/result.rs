//! The terminal result of a pipeline run.

use crate::core::{
    Artifact, CostEstimate, FailurePolicy, OverallStatus, ScanFinding, StageStatus,
};
use crate::errors::AdapterError;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// What happened to one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    /// The stage name.
    pub name: String,
    /// The stage status.
    pub status: StageStatus,
    /// The stage's failure policy.
    pub policy: FailurePolicy,
    /// The adapter error, for failed stages.
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<AdapterError>,
    /// Scan findings reported by the stage.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<ScanFinding>,
    /// Cost estimate reported by the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostEstimate>,
    /// Tool diagnostics.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
    /// Number of annotations the sink accepted.
    pub annotations_delivered: usize,
}

impl StageOutcome {
    /// Creates an outcome for a stage that never ran.
    #[must_use]
    pub fn not_run(name: impl Into<String>, policy: FailurePolicy, status: StageStatus) -> Self {
        Self {
            name: name.into(),
            status,
            policy,
            error: None,
            findings: Vec::new(),
            cost: None,
            diagnostics: String::new(),
            annotations_delivered: 0,
        }
    }

    /// Returns true if the stage ran and failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

fn serialize_error<S: Serializer>(error: &Option<AdapterError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Final status, per-stage outcomes and artifacts of a run.
///
/// Contains no timestamps or run ids: executing the same run against
/// side-effect-free adapters yields an equal result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// The target environment.
    pub environment: String,
    /// The folded run status.
    pub overall_status: OverallStatus,
    /// One outcome per configured stage, in order.
    pub outcomes: Vec<StageOutcome>,
    /// Artifacts recorded by successful producer stages, by stage name.
    pub artifacts: BTreeMap<String, Artifact>,
    /// Cancellation reason, if the run was cancelled between stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<String>,
}

impl PipelineResult {
    /// Returns true if the run succeeded and was not cancelled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.overall_status == OverallStatus::Success && self.cancelled.is_none()
    }

    /// Returns the outcome of a stage.
    #[must_use]
    pub fn outcome(&self, stage: &str) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.name == stage)
    }

    /// Returns the artifact recorded by a stage.
    #[must_use]
    pub fn artifact(&self, stage: &str) -> Option<&Artifact> {
        self.artifacts.get(stage)
    }

    /// Returns the stages with the given status, in order.
    #[must_use]
    pub fn stages_with_status(&self, status: StageStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Returns the stages whose adapter was invoked, in order.
    #[must_use]
    pub fn ran_stages(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status.ran())
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Returns every finding across all stages.
    pub fn findings(&self) -> impl Iterator<Item = &ScanFinding> {
        self.outcomes.iter().flat_map(|o| o.findings.iter())
    }

    /// Returns the process exit code for this result.
    ///
    /// Cancelled runs that would otherwise succeed report the pending code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.cancelled.is_some() && self.overall_status == OverallStatus::Success {
            OverallStatus::Pending.exit_code()
        } else {
            self.overall_status.exit_code()
        }
    }
}
