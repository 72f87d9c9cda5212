//! Annotation sink trait and implementations.

use crate::core::{Annotation, AnnotationTarget};
use crate::errors::AnnotationError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use tracing::{debug, info};

/// Receives annotations emitted by stages.
///
/// Delivery failures are reported back to the orchestrator, which logs them
/// and carries on.
#[async_trait]
pub trait AnnotationSink: Send + Sync {
    /// Delivers one annotation.
    async fn deliver(&self, annotation: &Annotation) -> Result<(), AnnotationError>;
}

/// Discards all annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAnnotationSink;

#[async_trait]
impl AnnotationSink for NoOpAnnotationSink {
    async fn deliver(&self, _annotation: &Annotation) -> Result<(), AnnotationError> {
        Ok(())
    }
}

/// Logs annotations through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAnnotationSink;

#[async_trait]
impl AnnotationSink for LoggingAnnotationSink {
    async fn deliver(&self, annotation: &Annotation) -> Result<(), AnnotationError> {
        info!(
            stage = %annotation.stage,
            target = %annotation.target,
            title = %annotation.title,
            "annotation"
        );
        debug!(body = %annotation.body, "annotation body");
        Ok(())
    }
}

/// Writes annotations as files under a root directory, one sub-directory per target.
#[derive(Debug, Clone)]
pub struct DirectoryAnnotationSink {
    root: PathBuf,
}

impl DirectoryAnnotationSink {
    /// Creates a sink rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the path an annotation is written to.
    #[must_use]
    pub fn path_for(&self, annotation: &Annotation) -> PathBuf {
        let extension = match annotation.target {
            AnnotationTarget::PullRequest => "md",
            AnnotationTarget::SecurityReport => "sarif",
            AnnotationTarget::ArtifactStore => "txt",
        };
        let file_name = format!(
            "{}-{}.{extension}",
            sanitize(&annotation.stage),
            sanitize(&annotation.title)
        );
        self.root.join(annotation.target.to_string()).join(file_name)
    }
}

fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "annotation".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl AnnotationSink for DirectoryAnnotationSink {
    async fn deliver(&self, annotation: &Annotation) -> Result<(), AnnotationError> {
        let path = self.path_for(annotation);
        let fail = |e: std::io::Error| {
            AnnotationError::new(&annotation.stage, annotation.target.to_string(), e.to_string())
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
        tokio::fs::write(&path, annotation.body.as_bytes())
            .await
            .map_err(fail)?;
        debug!(path = %path.display(), "annotation written");
        Ok(())
    }
}

/// Collects annotations in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingAnnotationSink {
    annotations: RwLock<Vec<Annotation>>,
}

impl CollectingAnnotationSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected annotations.
    #[must_use]
    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.read().clone()
    }

    /// Returns annotations delivered to `target`.
    #[must_use]
    pub fn for_target(&self, target: AnnotationTarget) -> Vec<Annotation> {
        self.annotations
            .read()
            .iter()
            .filter(|a| a.target == target)
            .cloned()
            .collect()
    }

    /// Returns the number of collected annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.read().is_empty()
    }
}

#[async_trait]
impl AnnotationSink for CollectingAnnotationSink {
    async fn deliver(&self, annotation: &Annotation) -> Result<(), AnnotationError> {
        self.annotations.write().push(annotation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingAnnotationSink::new();
        sink.deliver(&Annotation::pr_comment("Plan", "ok").for_stage("plan"))
            .await
            .unwrap();
        sink.deliver(
            &Annotation::new(AnnotationTarget::SecurityReport, "tfsec", "{}").for_stage("scan"),
        )
        .await
        .unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.for_target(AnnotationTarget::PullRequest).len(), 1);
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryAnnotationSink::new(dir.path());
        let annotation =
            Annotation::new(AnnotationTarget::SecurityReport, "tfsec report", "{}").for_stage("scan");

        sink.deliver(&annotation).await.unwrap();

        let path = sink.path_for(&annotation);
        assert!(path.ends_with("security_report/scan-tfsec_report.sarif"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_directory_sink_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "not a directory").unwrap();

        let sink = DirectoryAnnotationSink::new(&blocker);
        let err = sink
            .deliver(&Annotation::pr_comment("Plan", "x").for_stage("plan"))
            .await
            .unwrap_err();
        assert_eq!(err.stage, "plan");
        assert_eq!(err.target, "pull_request");
    }
}
