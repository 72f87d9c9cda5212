//! Cost estimate stage backed by Infracost.

use super::{exit_failure, invoke, reports};
use crate::annotations::render;
use crate::core::{AdapterOutput, Annotation};
use crate::stages::{StageAdapter, StageContext};
use crate::tools::{presets, ToolCommand};
use async_trait::async_trait;
use tracing::info;

/// Currency used when the stage has no `currency` input.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Produces a [`crate::core::CostEstimate`] artifact and a cost comment.
#[derive(Debug, Clone)]
pub struct CostAdapter {
    command: ToolCommand,
}

impl Default for CostAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CostAdapter {
    /// Creates an adapter running `infracost breakdown`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            command: presets::infracost_breakdown(),
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
impl StageAdapter for CostAdapter {
    fn kind(&self) -> &str {
        "infracost"
    }

    fn version(&self) -> Option<&str> {
        self.command.version.as_deref()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let currency = ctx.input("currency").unwrap_or(DEFAULT_CURRENCY).to_string();
        let mut vars = ctx.tool_vars();
        vars.insert("currency".to_string(), currency.clone());
        vars.entry("stack_dir".to_string())
            .or_insert_with(|| ".".to_string());

        let output = match invoke(ctx, &self.command, vars).await {
            Ok(output) => output,
            Err(failed) => return failed,
        };
        if !self.command.is_success_code(output.exit_code) {
            return exit_failure(&self.command, &output);
        }

        let estimate = match reports::parse_infracost(&output.stdout, &currency) {
            Ok(estimate) => estimate,
            Err(e) => {
                return AdapterOutput::failure(e.to_string()).with_diagnostics(output.diagnostics())
            }
        };
        info!(
            monthly = estimate.monthly_estimate,
            currency = %estimate.currency,
            resource_types = estimate.breakdown.len(),
            "cost estimate complete"
        );

        let value = match serde_json::to_value(&estimate) {
            Ok(value) => value,
            Err(e) => return AdapterOutput::failure(format!("cannot encode cost estimate: {e}")),
        };
        let comment = Annotation::pr_comment("cost-estimate", render::cost_comment(&estimate));
        AdapterOutput::with_artifact_value(value)
            .with_cost(estimate)
            .with_annotation(comment)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::adapters::test_support::sh;
    use crate::core::CostEstimate;
    use crate::credentials::StaticCredentialProvider;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_cost_estimate_artifact() {
        let inputs = BTreeMap::from([("currency".to_string(), "EUR".to_string())]);
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("cost_estimate", "dev", &inputs, &credentials);

        // Echoes back the currency the template was rendered with.
        let report = r#"{"currency": "CUR", "projects": [{"breakdown": {"resources": [{"name": "aws_instance.web", "monthlyCost": "12.5"}]}}]}"#;
        let script = format!("echo '{report}' | sed s/CUR/$INFRACOST_CURRENCY/");
        let adapter = CostAdapter::new()
            .with_command(sh(&script).with_env("INFRACOST_CURRENCY", "{currency}"));

        let output = adapter.execute(&ctx).await;
        assert!(output.is_success(), "{:?}", output.failure);

        let estimate = output.cost.clone().unwrap();
        assert_eq!(estimate.currency, "EUR");
        assert!((estimate.monthly_estimate - 12.5).abs() < f64::EPSILON);

        let artifact: CostEstimate = serde_json::from_value(output.artifact.unwrap()).unwrap();
        assert_eq!(artifact, estimate);
        assert_eq!(output.annotations.len(), 1);
        assert!(output.annotations[0].body.contains("12.50 EUR"));
    }

    #[tokio::test]
    async fn test_tool_failure() {
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("cost_estimate", "dev", &inputs, &credentials);

        let output = CostAdapter::new()
            .with_command(sh("echo 'No INFRACOST_API_KEY' >&2; exit 1"))
            .execute(&ctx)
            .await;
        assert_eq!(output.failure.as_deref(), Some("sh exited with code 1"));
        assert_eq!(output.diagnostics, "No INFRACOST_API_KEY");
        assert!(output.cost.is_none());
    }
}
