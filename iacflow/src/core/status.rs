//! Failure policies, stage statuses and the overall run status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run immediately and mark it failed.
    #[default]
    HardFail,
    /// Record the failure, mark the run partial, continue.
    SoftFail,
    /// Record the failure, continue, no status effect.
    ReportOnly,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardFail => write!(f, "hard_fail"),
            Self::SoftFail => write!(f, "soft_fail"),
            Self::ReportOnly => write!(f, "report_only"),
        }
    }
}

/// The recorded outcome of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The adapter ran and succeeded.
    Succeeded,
    /// The adapter ran and failed (or timed out).
    Failed,
    /// The stage was disabled by configuration.
    Disabled,
    /// The stage was not run because an earlier hard-fail stage failed.
    Halted,
    /// The stage was not run because the run was cancelled.
    Cancelled,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Disabled => write!(f, "disabled"),
            Self::Halted => write!(f, "halted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageStatus {
    /// Returns true if the adapter was actually invoked.
    #[must_use]
    pub fn ran(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the stage was not run for any reason.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        !self.ran()
    }
}

/// The aggregated status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// The run has not finished.
    #[default]
    Pending,
    /// No hard-fail or soft-fail stage failed.
    Success,
    /// At least one hard-fail stage failed.
    Failed,
    /// At least one soft-fail stage failed and no hard-fail stage failed.
    Partial,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

impl OverallStatus {
    /// Folds a list of failed-stage policies into the overall status.
    ///
    /// `failed` iff a hard-fail stage failed, `partial` iff a soft-fail stage
    /// failed and no hard-fail stage did, `success` otherwise. Report-only
    /// failures never count.
    #[must_use]
    pub fn from_failures<I>(failed_policies: I) -> Self
    where
        I: IntoIterator<Item = FailurePolicy>,
    {
        let mut status = Self::Success;
        for policy in failed_policies {
            match policy {
                FailurePolicy::HardFail => return Self::Failed,
                FailurePolicy::SoftFail => status = Self::Partial,
                FailurePolicy::ReportOnly => {}
            }
        }
        status
    }

    /// Returns the process exit code conventionally used for this status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Partial => 2,
            Self::Pending => 3,
        }
    }
}
