//! Pass/fail checks such as `pre-commit run --all-files`.

use super::{exit_failure, invoke};
use crate::core::AdapterOutput;
use crate::stages::{StageAdapter, StageContext};
use crate::tools::{presets, ToolCommand};
use async_trait::async_trait;
use tracing::debug;

/// Runs a tool whose exit code is the whole verdict.
#[derive(Debug, Clone)]
pub struct CheckAdapter {
    kind: String,
    command: ToolCommand,
}

impl CheckAdapter {
    /// Creates a check running `command`.
    #[must_use]
    pub fn new(kind: impl Into<String>, command: ToolCommand) -> Self {
        Self {
            kind: kind.into(),
            command,
        }
    }

    /// Runs the repository's pre-commit hooks.
    #[must_use]
    pub fn pre_commit() -> Self {
        Self::new("pre-commit", presets::pre_commit())
    }

    /// Pins the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.command = self.command.with_version(version);
        self
    }
}

#[async_trait]
impl StageAdapter for CheckAdapter {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn version(&self) -> Option<&str> {
        self.command.version.as_deref()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let output = match invoke(ctx, &self.command, ctx.tool_vars()).await {
            Ok(output) => output,
            Err(failed) => return failed,
        };
        debug!(kind = %self.kind, exit_code = output.exit_code, "check finished");
        if self.command.is_success_code(output.exit_code) {
            AdapterOutput::success().with_diagnostics(output.diagnostics())
        } else {
            exit_failure(&self.command, &output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialProvider;
    use std::collections::BTreeMap;

    #[test]
    fn test_pre_commit_preset() {
        let adapter = CheckAdapter::pre_commit().with_version("3.7.1");
        assert_eq!(adapter.kind(), "pre-commit");
        assert_eq!(adapter.version(), Some("3.7.1"));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("pre_commit", "dev", &inputs, &credentials);

        let output = CheckAdapter::new("lint", ToolCommand::new("iacflow-no-such-tool"))
            .execute(&ctx)
            .await;
        assert!(output
            .failure
            .as_deref()
            .is_some_and(|f| f.starts_with("Failed to run 'iacflow-no-such-tool'")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_decides() {
        use crate::adapters::test_support::sh;

        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("pre_commit", "dev", &inputs, &credentials);

        let pass = CheckAdapter::new("lint", sh("echo 'all hooks passed'"))
            .execute(&ctx)
            .await;
        assert!(pass.is_success());
        assert_eq!(pass.diagnostics, "all hooks passed");

        let fail = CheckAdapter::new("lint", sh("echo 'trailing whitespace' >&2; exit 1"))
            .execute(&ctx)
            .await;
        assert_eq!(fail.failure.as_deref(), Some("sh exited with code 1"));
        assert_eq!(fail.diagnostics, "trailing whitespace");
    }
}
