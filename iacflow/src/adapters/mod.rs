//! Stage adapters backed by external IaC tools.
//!
//! Every adapter renders a [`ToolCommand`] from the stage context, runs it
//! through [`run_tool`] and turns the captured output into an
//! [`AdapterOutput`]. Tool problems never escape as errors; they become
//! failed outputs for the orchestrator to classify.

mod apply;
mod check;
mod cost;
mod plan;
pub mod reports;
mod scan;

pub use apply::ApplyAdapter;
pub use check::CheckAdapter;
pub use cost::CostAdapter;
pub use plan::{PlanAdapter, PlanArtifact, PlanTool};
pub use scan::{ScanAdapter, Scanner};

use crate::core::AdapterOutput;
use crate::errors::ToolError;
use crate::stages::StageContext;
use crate::tools::{run_tool, ToolCommand, ToolInvocation, ToolOutput};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Runs `command` for the stage in `ctx` with the given template variables.
///
/// Declared secrets are resolved first; any missing secret fails the stage
/// without starting the tool.
pub(crate) async fn invoke(
    ctx: &StageContext<'_>,
    command: &ToolCommand,
    vars: BTreeMap<String, String>,
) -> Result<ToolOutput, AdapterOutput> {
    let secrets = ctx.resolve_secrets().map_err(|missing| {
        warn!(stage = ctx.stage(), ?missing, "unresolved secrets");
        AdapterOutput::failure(format!("missing secrets: {}", missing.join(", ")))
    })?;

    run_tool(
        ToolInvocation::new(command)
            .with_vars(vars)
            .with_secrets(secrets)
            .with_timeout(ctx.timeout()),
    )
    .await
    .map_err(tool_failure)
}

/// Converts a tool error into a failed adapter output.
pub(crate) fn tool_failure(err: ToolError) -> AdapterOutput {
    match err {
        ToolError::TimedOut { timeout, .. } => AdapterOutput::timed_out(timeout),
        other => AdapterOutput::failure(other.to_string()),
    }
}

/// Builds the failure for a tool that exited with a non-success code.
pub(crate) fn exit_failure(command: &ToolCommand, output: &ToolOutput) -> AdapterOutput {
    AdapterOutput::failure(format!(
        "{} exited with code {}",
        command.program, output.exit_code
    ))
    .with_diagnostics(output.diagnostics())
}

/// Returns the hex sha256 digest of a file.
pub(crate) async fn file_digest(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
