//! Apply stage: applies the plan recorded by the plan stage.

use super::{exit_failure, file_digest, invoke, PlanArtifact};
use crate::config::DeploymentScope;
use crate::core::{AdapterOutput, Annotation, AnnotationTarget, ArtifactInput};
use crate::stages::{StageAdapter, StageContext};
use crate::tools::{presets, ToolCommand};
use async_trait::async_trait;
use tracing::{info, warn};

/// Applies a previously recorded plan.
///
/// Refuses to run without the plan artifact, and refuses a plan file whose
/// digest no longer matches the one recorded at plan time.
#[derive(Debug, Clone)]
pub struct ApplyAdapter {
    kind: &'static str,
    plan_stage: String,
    command: ToolCommand,
}

impl ApplyAdapter {
    /// Applies the Terraform plan produced by the stage named `plan_stage`.
    #[must_use]
    pub fn new(plan_stage: impl Into<String>) -> Self {
        Self {
            kind: "terraform-apply",
            plan_stage: plan_stage.into(),
            command: presets::terraform_apply(),
        }
    }

    /// Deploys the Bicep template previewed by the what-if in `plan_stage`.
    #[must_use]
    pub fn az_deployment(plan_stage: impl Into<String>, scope: DeploymentScope) -> Self {
        Self {
            kind: "az-deployment",
            plan_stage: plan_stage.into(),
            command: presets::az_deployment_create(scope),
        }
    }

    /// Replaces the command template.
    #[must_use]
    pub fn with_command(mut self, command: ToolCommand) -> Self {
        self.command = command;
        self
    }

    /// Pins the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.command = self.command.with_version(version);
        self
    }
}

#[async_trait]
impl StageAdapter for ApplyAdapter {
    fn kind(&self) -> &str {
        self.kind
    }

    fn version(&self) -> Option<&str> {
        self.command.version.as_deref()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let artifact = match ctx.artifact(&self.plan_stage) {
            ArtifactInput::Available(artifact) => artifact,
            ArtifactInput::Absent => {
                warn!(stage = ctx.stage(), producer = %self.plan_stage, "plan artifact absent");
                return AdapterOutput::failure(format!(
                    "no plan artifact from '{}'; refusing to apply",
                    self.plan_stage
                ));
            }
        };
        let plan: PlanArtifact = match serde_json::from_value(artifact.data.clone()) {
            Ok(plan) => plan,
            Err(e) => return AdapterOutput::failure(format!("malformed plan artifact: {e}")),
        };

        if !plan.has_changes {
            info!(environment = %plan.environment, "plan has no changes, nothing to apply");
            return AdapterOutput::success().with_diagnostics("No changes to apply.");
        }

        if let Some(expected) = &plan.sha256 {
            match file_digest(&plan.plan_path()).await {
                Ok(actual) if &actual == expected => {}
                Ok(actual) => {
                    return AdapterOutput::failure(format!(
                        "plan file {} changed since planning (expected sha256 {expected}, found {actual})",
                        plan.plan_path().display()
                    ));
                }
                Err(e) => {
                    return AdapterOutput::failure(format!(
                        "cannot read plan file {}: {e}",
                        plan.plan_path().display()
                    ));
                }
            }
        }

        let mut vars = ctx.tool_vars();
        vars.insert("stack_dir".to_string(), plan.stack_dir.clone());
        vars.insert("plan_file".to_string(), plan.plan_file.clone());

        let output = match invoke(ctx, &self.command, vars).await {
            Ok(output) => output,
            Err(failed) => return failed,
        };
        if !self.command.is_success_code(output.exit_code) {
            return exit_failure(&self.command, &output);
        }

        info!(environment = %plan.environment, duration_ms = output.duration_ms, "apply complete");
        AdapterOutput::success()
            .with_diagnostics(output.diagnostics())
            .with_annotation(Annotation::new(
                AnnotationTarget::ArtifactStore,
                format!("apply-{}", plan.environment),
                output.stdout,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Artifact;
    use crate::credentials::StaticCredentialProvider;
    use std::collections::BTreeMap;

    fn plan_artifact(has_changes: bool, sha256: Option<&str>, stack_dir: &str) -> Artifact {
        let plan = PlanArtifact {
            plan_file: "dev.tfplan".to_string(),
            stack_dir: stack_dir.to_string(),
            environment: "dev".to_string(),
            has_changes,
            summary: "Plan: 1 to add, 0 to change, 0 to destroy.".to_string(),
            sha256: sha256.map(str::to_string),
        };
        Artifact::new("plan", "plan", serde_json::to_value(plan).unwrap())
    }

    #[tokio::test]
    async fn test_absent_plan_fails() {
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("apply", "dev", &inputs, &credentials).with_artifact("plan", None);

        let output = ApplyAdapter::new("plan").execute(&ctx).await;
        assert_eq!(
            output.failure.as_deref(),
            Some("no plan artifact from 'plan'; refusing to apply")
        );
    }

    #[tokio::test]
    async fn test_no_changes_skips_tool() {
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let artifact = plan_artifact(false, None, ".");
        let ctx = StageContext::new("apply", "dev", &inputs, &credentials)
            .with_artifact("plan", Some(&artifact));

        // The program does not exist; reaching it would fail the stage.
        let adapter = ApplyAdapter::new("plan").with_command(ToolCommand::new("no-such-tool"));
        let output = adapter.execute(&ctx).await;
        assert!(output.is_success());
        assert_eq!(output.diagnostics, "No changes to apply.");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ApplyAdapter::new("plan").kind(), "terraform-apply");
        let az = ApplyAdapter::az_deployment("plan", DeploymentScope::Subscription);
        assert_eq!(az.kind(), "az-deployment");
        assert_eq!(az.command.args[1], "sub");
    }

    #[tokio::test]
    async fn test_digest_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dev.tfplan"), b"tampered").unwrap();
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let artifact = plan_artifact(true, Some("00"), &dir.path().display().to_string());
        let ctx = StageContext::new("apply", "dev", &inputs, &credentials)
            .with_artifact("plan", Some(&artifact));

        let adapter = ApplyAdapter::new("plan").with_command(ToolCommand::new("no-such-tool"));
        let output = adapter.execute(&ctx).await;
        assert!(output
            .failure
            .as_deref()
            .is_some_and(|f| f.contains("changed since planning")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_apply_runs_with_plan_vars() {
        use crate::adapters::test_support::sh;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dev.tfplan"), b"abc").unwrap();
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let artifact = plan_artifact(
            true,
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
            &dir.path().display().to_string(),
        );
        let ctx = StageContext::new("apply", "dev", &inputs, &credentials)
            .with_artifact("plan", Some(&artifact));

        let adapter = ApplyAdapter::new("plan")
            .with_command(sh("echo applying {plan_file} in {environment}"))
            .with_version("1.9.5");
        let output = adapter.execute(&ctx).await;

        assert!(output.is_success(), "{:?}", output.failure);
        assert_eq!(adapter.version(), Some("1.9.5"));
        assert_eq!(output.annotations.len(), 1);
        assert_eq!(output.annotations[0].target, AnnotationTarget::ArtifactStore);
        assert_eq!(output.annotations[0].body.trim(), "applying dev.tfplan in dev");
    }
}
