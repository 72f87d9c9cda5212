//! Error types for the iacflow orchestrator.
//!
//! Configuration errors are fatal and surface before any stage runs. Adapter
//! errors are contained by the failing stage's failure policy and never
//! escape `execute`. Annotation errors are logged and dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for iacflow operations.
#[derive(Debug, Error)]
pub enum IacflowError {
    /// The stage graph or run configuration is invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The configuration file or an environment override could not be loaded.
    #[error("{0}")]
    ConfigLoad(#[from] ConfigLoadError),

    /// A stage adapter failed.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// An annotation could not be delivered.
    #[error("{0}")]
    Annotation(#[from] AnnotationError),

    /// An external tool could not be run or its output understood.
    #[error("{0}")]
    Tool(#[from] ToolError),
}

/// Metadata attached to a configuration error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-FORWARD-REF").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error codes used by [`ConfigurationError`].
pub mod codes {
    /// A stage consumes an artifact from a stage defined later in the sequence.
    pub const FORWARD_REF: &str = "CONFIG-FORWARD-REF";
    /// A stage consumes an artifact from a stage that does not exist.
    pub const UNKNOWN_REF: &str = "CONFIG-UNKNOWN-REF";
    /// A stage consumes its own artifact.
    pub const SELF_REF: &str = "CONFIG-SELF-REF";
    /// A stage consumes from a stage that declares no artifact.
    pub const NOT_PRODUCER: &str = "CONFIG-NOT-PRODUCER";
    /// Two stages share a name.
    pub const DUPLICATE_STAGE: &str = "CONFIG-DUPLICATE-STAGE";
    /// A stage or environment name is empty.
    pub const EMPTY_NAME: &str = "CONFIG-EMPTY-NAME";
}

/// Error raised when a pipeline run cannot be configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional structured error info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the structured error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised while loading a [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The configuration document is not valid JSON for the schema.
    #[error("Invalid pipeline configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// An environment override holds a value of the wrong shape.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidOverride {
        /// The environment variable name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A configuration field holds a value outside its accepted range.
    #[error("Invalid value for `{field}`: {value}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// The rejected value.
        value: String,
    },
}

/// Failure of a stage adapter. Both variants are handled by the stage's
/// failure policy in exactly the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The adapter or its external tool reported failure.
    #[error("Stage '{stage}' failed: {message}")]
    Failure {
        /// The stage name.
        stage: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The adapter did not finish within the stage timeout.
    #[error("Stage '{stage}' timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        /// The stage name.
        stage: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl AdapterError {
    /// Creates an adapter failure.
    #[must_use]
    pub fn failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates an adapter timeout.
    #[must_use]
    pub fn timeout(stage: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            stage: stage.into(),
            timeout,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Failure { stage, .. } | Self::Timeout { stage, .. } => stage,
        }
    }

    /// Returns true if this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failure to deliver an annotation. Never affects pipeline status.
#[derive(Debug, Clone, Error)]
#[error("Annotation for stage '{stage}' could not be delivered to {target}: {reason}")]
pub struct AnnotationError {
    /// The stage that emitted the annotation.
    pub stage: String,
    /// The target that rejected it.
    pub target: String,
    /// The reason for the failure.
    pub reason: String,
}

impl AnnotationError {
    /// Creates a new annotation error.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool process could not be spawned or awaited.
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        /// The program name.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish in time and was killed.
    #[error("'{program}' did not finish within {}s", .timeout.as_secs_f64())]
    TimedOut {
        /// The program name.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A command template references an unknown placeholder.
    #[error("Unknown placeholder '{{{placeholder}}}' in command for '{program}'")]
    UnknownPlaceholder {
        /// The program name.
        program: String,
        /// The placeholder name.
        placeholder: String,
    },

    /// The tool report could not be parsed.
    #[error("Cannot parse {format} report: {reason}")]
    Report {
        /// The report format (e.g., "tfsec").
        format: String,
        /// The reason parsing failed.
        reason: String,
    },

    /// A file the tool depends on could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Creates a report parse error.
    #[must_use]
    pub fn report(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Report {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Converts the tool error into an adapter error for `stage`.
    #[must_use]
    pub fn into_adapter_error(self, stage: &str) -> AdapterError {
        match self {
            Self::TimedOut { timeout, .. } => AdapterError::timeout(stage, timeout),
            other => AdapterError::failure(stage, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_code() {
        let err = ConfigurationError::new("bad graph")
            .with_stages(vec!["apply".to_string(), "plan".to_string()])
            .with_error_info(
                ErrorInfo::new(codes::FORWARD_REF, "forward reference")
                    .with_fix_hint("Move the producer earlier")
                    .with_context_entry("consumer", "apply"),
            );

        assert_eq!(err.code(), Some(codes::FORWARD_REF));
        assert_eq!(err.stages.len(), 2);
        assert_eq!(err.to_string(), "bad graph");
    }

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::failure("scan", "3 high findings");
        assert_eq!(err.to_string(), "Stage 'scan' failed: 3 high findings");
        assert_eq!(err.stage(), "scan");
        assert!(!err.is_timeout());

        let err = AdapterError::timeout("plan", Duration::from_secs(30));
        assert!(err.to_string().contains("timed out after 30s"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_tool_timeout_maps_to_adapter_timeout() {
        let err = ToolError::TimedOut {
            program: "terraform".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.into_adapter_error("plan").is_timeout());

        let err = ToolError::report("tfsec", "missing results");
        let adapter = err.into_adapter_error("scan");
        assert!(!adapter.is_timeout());
        assert!(adapter.to_string().contains("tfsec"));
    }

    #[test]
    fn test_unknown_placeholder_display() {
        let err = ToolError::UnknownPlaceholder {
            program: "terraform".to_string(),
            placeholder: "stack".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown placeholder '{stack}' in command for 'terraform'"
        );
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: IacflowError = ConfigurationError::new("x").into();
        assert!(matches!(err, IacflowError::Configuration(_)));
    }
}
