//! Plan stage: `terraform plan` or `az deployment what-if`.

use super::{exit_failure, file_digest, invoke};
use crate::annotations::render;
use crate::config::DeploymentScope;
use crate::core::{AdapterOutput, Annotation};
use crate::stages::{StageAdapter, StageContext};
use crate::tools::{presets, ToolCommand};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

#[allow(clippy::unwrap_used)]
fn terraform_summary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*(Plan: [0-9]+ to .*\.|No changes\.)").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn what_if_summary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*Resource changes: (.*)$").unwrap())
}

/// The planning tool behind a [`PlanAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTool {
    /// `terraform plan -out=<plan_file>`.
    Terraform,
    /// `az deployment <scope> what-if` for Bicep templates.
    AzWhatIf(DeploymentScope),
}

/// The artifact recorded by the plan stage and consumed by apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanArtifact {
    /// Plan file, relative to `stack_dir`.
    pub plan_file: String,
    /// Directory the plan was made in.
    pub stack_dir: String,
    /// Target environment.
    pub environment: String,
    /// Whether the plan changes anything.
    pub has_changes: bool,
    /// One-line plan summary.
    pub summary: String,
    /// Hex sha256 of the plan file, when it could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl PlanArtifact {
    /// Returns the plan file location.
    #[must_use]
    pub fn plan_path(&self) -> std::path::PathBuf {
        Path::new(&self.stack_dir).join(&self.plan_file)
    }
}

/// Produces a plan artifact and a pull request summary.
#[derive(Debug, Clone)]
pub struct PlanAdapter {
    tool: PlanTool,
    command: ToolCommand,
}

impl PlanAdapter {
    /// Plans with Terraform.
    #[must_use]
    pub fn terraform() -> Self {
        Self {
            tool: PlanTool::Terraform,
            command: presets::terraform_plan(),
        }
    }

    /// Plans with an Azure what-if deployment.
    #[must_use]
    pub fn az_what_if(scope: DeploymentScope) -> Self {
        Self {
            tool: PlanTool::AzWhatIf(scope),
            command: presets::az_what_if(scope),
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

    /// Returns the planning tool.
    #[must_use]
    pub fn tool(&self) -> PlanTool {
        self.tool
    }

    fn default_plan_file(&self, environment: &str) -> String {
        match self.tool {
            PlanTool::Terraform => format!("{environment}.tfplan"),
            PlanTool::AzWhatIf(_) => format!("{environment}.whatif.json"),
        }
    }
}

#[async_trait]
impl StageAdapter for PlanAdapter {
    fn kind(&self) -> &str {
        match self.tool {
            PlanTool::Terraform => "terraform-plan",
            PlanTool::AzWhatIf(_) => "az-what-if",
        }
    }

    fn version(&self) -> Option<&str> {
        self.command.version.as_deref()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let environment = ctx.environment();
        let stack_dir = ctx.input("stack_dir").unwrap_or(".").to_string();
        let plan_file = ctx
            .input("plan_file")
            .map_or_else(|| self.default_plan_file(environment), str::to_string);

        let mut vars = ctx.tool_vars();
        vars.insert("stack_dir".to_string(), stack_dir.clone());
        vars.insert("plan_file".to_string(), plan_file.clone());

        let output = match invoke(ctx, &self.command, vars).await {
            Ok(output) => output,
            Err(failed) => return failed,
        };
        if !self.command.is_success_code(output.exit_code) {
            return exit_failure(&self.command, &output);
        }

        let mut artifact = PlanArtifact {
            plan_file,
            stack_dir,
            environment: environment.to_string(),
            has_changes: false,
            summary: String::new(),
            sha256: None,
        };

        match self.tool {
            PlanTool::Terraform => {
                artifact.has_changes = output.exit_code == 2;
                artifact.summary = terraform_summary(&output.stdout, artifact.has_changes);
            }
            PlanTool::AzWhatIf(_) => {
                if let Err(e) = tokio::fs::write(artifact.plan_path(), output.stdout.as_bytes()).await {
                    return AdapterOutput::failure(format!(
                        "cannot write what-if result to {}: {e}",
                        artifact.plan_path().display()
                    ));
                }
                (artifact.has_changes, artifact.summary) = what_if_summary(&output.stdout);
            }
        }

        match file_digest(&artifact.plan_path()).await {
            Ok(digest) => artifact.sha256 = Some(digest),
            Err(e) => warn!(
                plan = %artifact.plan_path().display(),
                error = %e,
                "plan file not readable, apply will not verify it"
            ),
        }

        info!(
            environment,
            has_changes = artifact.has_changes,
            summary = %artifact.summary,
            "plan complete"
        );

        let comment = Annotation::pr_comment(
            format!("plan-{environment}"),
            render::plan_comment(environment, &artifact.summary, &output.stdout),
        );
        match serde_json::to_value(&artifact) {
            Ok(value) => AdapterOutput::with_artifact_value(value)
                .with_diagnostics(output.diagnostics())
                .with_annotation(comment),
            Err(e) => AdapterOutput::failure(format!("cannot encode plan artifact: {e}")),
        }
    }
}

/// Extracts the `Plan: ...` or `No changes.` line from terraform output.
fn terraform_summary(stdout: &str, has_changes: bool) -> String {
    terraform_summary_pattern()
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map_or_else(
            || {
                if has_changes {
                    "Changes present.".to_string()
                } else {
                    "No changes.".to_string()
                }
            },
            |m| m.as_str().to_string(),
        )
}

/// Summarizes what-if output: JSON `changes[]` first, then the text
/// `Resource changes:` line.
fn what_if_summary(stdout: &str) -> (bool, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        if let Some(changes) = value.get("changes").and_then(serde_json::Value::as_array) {
            let mut counts = [0usize; 3];
            for change in changes {
                match change.get("changeType").and_then(serde_json::Value::as_str) {
                    Some("Create") => counts[0] += 1,
                    Some("Modify" | "Deploy") => counts[1] += 1,
                    Some("Delete") => counts[2] += 1,
                    _ => {}
                }
            }
            let has_changes = counts.iter().any(|n| *n > 0);
            let summary = if has_changes {
                format!(
                    "What-if: {} to create, {} to modify, {} to delete.",
                    counts[0], counts[1], counts[2]
                )
            } else {
                "No changes.".to_string()
            };
            return (has_changes, summary);
        }
    }

    match what_if_summary_pattern().captures(stdout).and_then(|c| c.get(1)) {
        Some(m) => {
            let line = m.as_str().trim();
            let has_changes = line.split(',').any(|part| {
                let part = part.trim().trim_end_matches('.');
                let count = part
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(0);
                count > 0 && !part.ends_with("no change") && !part.ends_with("to ignore")
            });
            (has_changes, format!("Resource changes: {line}"))
        }
        None => (false, "No changes.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_terraform_summary() {
        let stdout = "Terraform will perform the following actions:\n\nPlan: 2 to add, 1 to change, 0 to destroy.\n";
        assert_eq!(
            terraform_summary(stdout, true),
            "Plan: 2 to add, 1 to change, 0 to destroy."
        );
        assert_eq!(
            terraform_summary("No changes. Your infrastructure matches the configuration.", false),
            "No changes."
        );
        assert_eq!(terraform_summary("", true), "Changes present.");
    }

    #[test]
    fn test_what_if_summary_json() {
        let stdout = r#"{"status": "Succeeded", "changes": [
            {"changeType": "Create", "resourceId": "/a"},
            {"changeType": "Modify", "resourceId": "/b"},
            {"changeType": "NoChange", "resourceId": "/c"}
        ]}"#;
        assert_eq!(
            what_if_summary(stdout),
            (true, "What-if: 1 to create, 1 to modify, 0 to delete.".to_string())
        );

        let unchanged = r#"{"changes": [{"changeType": "Ignore"}]}"#;
        assert_eq!(what_if_summary(unchanged), (false, "No changes.".to_string()));
    }

    #[test]
    fn test_what_if_summary_text() {
        let stdout = "Resource and property changes are indicated with these symbols:\n\nResource changes: 1 to create, 2 no change.\n";
        let (has_changes, summary) = what_if_summary(stdout);
        assert!(has_changes);
        assert_eq!(summary, "Resource changes: 1 to create, 2 no change.");

        let (has_changes, _) = what_if_summary("Resource changes: 3 no change.");
        assert!(!has_changes);
    }

    #[test]
    fn test_plan_artifact_path() {
        let artifact = PlanArtifact {
            plan_file: "dev.tfplan".to_string(),
            stack_dir: "infra".to_string(),
            environment: "dev".to_string(),
            has_changes: true,
            summary: "Plan: 1 to add, 0 to change, 0 to destroy.".to_string(),
            sha256: None,
        };
        assert_eq!(artifact.plan_path(), Path::new("infra/dev.tfplan"));
        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("sha256").is_none());
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use crate::adapters::test_support::sh;
        use crate::core::AnnotationTarget;
        use crate::credentials::StaticCredentialProvider;
        use std::collections::BTreeMap;

        fn inputs(dir: &Path) -> BTreeMap<String, String> {
            BTreeMap::from([("stack_dir".to_string(), dir.display().to_string())])
        }

        #[tokio::test]
        async fn test_terraform_plan_with_changes() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = PlanAdapter::terraform().with_command(
                sh("printf abc > {stack_dir}/{plan_file}; echo 'Plan: 1 to add, 0 to change, 0 to destroy.'; exit 2")
                    .with_success_codes([0, 2]),
            );
            let inputs = inputs(dir.path());
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("plan", "dev", &inputs, &credentials);

            let output = adapter.execute(&ctx).await;
            assert!(output.is_success(), "{:?}", output.failure);

            let artifact: PlanArtifact =
                serde_json::from_value(output.artifact.clone().unwrap()).unwrap();
            assert_eq!(artifact.plan_file, "dev.tfplan");
            assert!(artifact.has_changes);
            assert_eq!(artifact.summary, "Plan: 1 to add, 0 to change, 0 to destroy.");
            assert_eq!(
                artifact.sha256.as_deref(),
                Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
            );
            assert_eq!(output.annotations.len(), 1);
            assert_eq!(output.annotations[0].target, AnnotationTarget::PullRequest);
        }

        #[tokio::test]
        async fn test_terraform_plan_error_exit() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = PlanAdapter::terraform().with_command(
                sh("echo 'Error: Invalid provider' >&2; exit 1").with_success_codes([0, 2]),
            );
            let inputs = inputs(dir.path());
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("plan", "dev", &inputs, &credentials);

            let output = adapter.execute(&ctx).await;
            assert_eq!(output.failure.as_deref(), Some("sh exited with code 1"));
            assert_eq!(output.diagnostics, "Error: Invalid provider");
            assert!(output.artifact.is_none());
        }

        #[tokio::test]
        async fn test_what_if_writes_plan_file() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = PlanAdapter::az_what_if(DeploymentScope::Subscription)
                .with_command(sh(r#"echo '{"changes": [{"changeType": "Delete"}]}'"#))
                .with_version("2.61.0");
            let inputs = inputs(dir.path());
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("plan", "prod", &inputs, &credentials);

            let output = adapter.execute(&ctx).await;
            assert!(output.is_success(), "{:?}", output.failure);
            assert_eq!(adapter.version(), Some("2.61.0"));

            let artifact: PlanArtifact =
                serde_json::from_value(output.artifact.unwrap()).unwrap();
            assert_eq!(artifact.plan_file, "prod.whatif.json");
            assert!(artifact.has_changes);
            assert!(artifact.sha256.is_some());
            assert!(dir.path().join("prod.whatif.json").exists());
        }
    }
}
