//! Human-readable side-channel output emitted by stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an annotation should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationTarget {
    /// A comment on the pull request that triggered the run.
    PullRequest,
    /// A security report upload (e.g., SARIF).
    SecurityReport,
    /// A file kept in the run's artifact store.
    ArtifactStore,
}

impl fmt::Display for AnnotationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullRequest => write!(f, "pull_request"),
            Self::SecurityReport => write!(f, "security_report"),
            Self::ArtifactStore => write!(f, "artifact_store"),
        }
    }
}

/// A human-readable payload emitted by a stage.
///
/// Annotations never influence control flow; delivering them is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// The stage that emitted the annotation. Filled in by the orchestrator.
    pub stage: String,
    /// The delivery target.
    pub target: AnnotationTarget,
    /// A short title (comment heading or report file name).
    pub title: String,
    /// The annotation body (markdown, SARIF JSON, ...).
    pub body: String,
    /// When the annotation was created.
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// Creates a new annotation.
    #[must_use]
    pub fn new(target: AnnotationTarget, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            stage: String::new(),
            target,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a pull request comment.
    #[must_use]
    pub fn pr_comment(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(AnnotationTarget::PullRequest, title, body)
    }

    /// Attributes the annotation to `stage`.
    #[must_use]
    pub fn for_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }
}
