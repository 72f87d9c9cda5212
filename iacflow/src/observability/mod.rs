//! Logging setup and run summaries.
//!
//! Library code only emits `tracing` events; binaries and test harnesses
//! call [`init_logging`] once to install a subscriber.

use crate::core::StageStatus;
use crate::pipeline::PipelineResult;
use anyhow::Context;
use serde_json::json;
use std::collections::BTreeMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "iacflow=info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, for CI log collectors.
    Json,
}

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}

/// Builds a wide summary payload for a finished run.
///
/// One object carrying per-stage statuses, status counts, artifact labels
/// and finding totals, suitable for a single structured log line.
#[must_use]
pub fn run_summary(result: &PipelineResult) -> serde_json::Value {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for outcome in &result.outcomes {
        *counts.entry(outcome.status.to_string()).or_default() += 1;
    }
    let stages: Vec<serde_json::Value> = result
        .outcomes
        .iter()
        .map(|o| {
            let mut stage = json!({ "stage": o.name, "status": o.status });
            if let Some(error) = &o.error {
                stage["error"] = json!(error.to_string());
            }
            stage
        })
        .collect();

    json!({
        "environment": result.environment,
        "status": result.overall_status,
        "exit_code": result.exit_code(),
        "cancelled": result.cancelled,
        "stages": stages,
        "status_counts": counts,
        "failed_stages": result.stages_with_status(StageStatus::Failed),
        "artifacts": result.artifacts.keys().collect::<Vec<_>>(),
        "findings": result.findings().count(),
    })
}
