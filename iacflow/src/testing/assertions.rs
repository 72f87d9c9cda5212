//! Test assertions for pipeline results.

use crate::core::{OverallStatus, StageStatus};
use crate::pipeline::PipelineResult;

/// Asserts that the run has the expected overall status.
pub fn assert_pipeline_status(result: &PipelineResult, expected: OverallStatus) {
    assert_eq!(
        result.overall_status, expected,
        "Expected pipeline status {:?}, got {:?}. Outcomes: {:?}",
        expected,
        result.overall_status,
        result
            .outcomes
            .iter()
            .map(|o| (o.name.as_str(), o.status))
            .collect::<Vec<_>>()
    );
}

/// Asserts that a stage ended with the expected status.
pub fn assert_stage_status(result: &PipelineResult, stage: &str, expected: StageStatus) {
    let actual = result.outcome(stage).map(|o| o.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage}' to be {expected:?}, got {actual:?}"
    );
}

/// Asserts that exactly `expected` stages invoked their adapters, in order.
pub fn assert_stages_ran(result: &PipelineResult, expected: &[&str]) {
    let ran = result.ran_stages();
    assert_eq!(ran, expected, "Unexpected set of stages ran");
}

/// Asserts that the run recorded an artifact for `stage`.
pub fn assert_has_artifact(result: &PipelineResult, stage: &str) {
    assert!(
        result.artifact(stage).is_some(),
        "Expected an artifact from '{}', recorded: {:?}",
        stage,
        result.artifacts.keys().collect::<Vec<_>>()
    );
}

/// Asserts that the run recorded exactly the artifacts of `stages`.
pub fn assert_artifacts(result: &PipelineResult, stages: &[&str]) {
    let recorded: Vec<&str> = result.artifacts.keys().map(String::as_str).collect();
    let mut expected = stages.to_vec();
    expected.sort_unstable();
    assert_eq!(recorded, expected, "Unexpected set of artifacts");
}
