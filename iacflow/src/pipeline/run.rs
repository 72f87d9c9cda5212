//! A configured, ready-to-execute pipeline run.

use super::StageDefinition;

/// An ordered, validated stage sequence for one environment.
///
/// Built by [`super::configure`]; enable flags are already folded into each
/// stage's `enabled` field and the order never changes afterwards.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    environment: String,
    stages: Vec<StageDefinition>,
}

impl PipelineRun {
    pub(super) fn new(environment: String, stages: Vec<StageDefinition>) -> Self {
        Self {
            environment,
            stages,
        }
    }

    /// Returns the target environment.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Returns a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the number of enabled stages.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.stages.iter().filter(|s| s.enabled).count()
    }
}
