//! Artifacts passed from producer stages to consumer stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opaque payload produced by one stage and read by later stages.
///
/// Artifacts are owned by the run. Consumers only ever see a shared borrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The stage that produced the artifact.
    pub producer: String,

    /// The artifact label declared by the producer (e.g., "plan").
    pub kind: String,

    /// The artifact content.
    pub data: serde_json::Value,

    /// Additional metadata about the artifact.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(
        producer: impl Into<String>,
        kind: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            producer: producer.into(),
            kind: kind.into(),
            data,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds metadata to the artifact.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns a field of the artifact data as a string.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}

/// What a consumer stage sees for a declared upstream artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArtifactInput<'a> {
    /// The producer ran successfully and recorded an artifact.
    Available(&'a Artifact),
    /// The producer was disabled, failed, or never produced anything.
    Absent,
}

impl<'a> ArtifactInput<'a> {
    /// Returns the artifact, if available.
    #[must_use]
    pub fn available(self) -> Option<&'a Artifact> {
        match self {
            Self::Available(artifact) => Some(artifact),
            Self::Absent => None,
        }
    }

    /// Returns true if the artifact is absent.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<'a> From<Option<&'a Artifact>> for ArtifactInput<'a> {
    fn from(value: Option<&'a Artifact>) -> Self {
        value.map_or(Self::Absent, Self::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let artifact = Artifact::new("plan", "plan", serde_json::json!({"plan_file": "tf.plan"}))
            .with_metadata("tool_version", serde_json::json!("1.7.5"));

        assert_eq!(artifact.producer, "plan");
        assert_eq!(artifact.str_field("plan_file"), Some("tf.plan"));
        assert_eq!(artifact.str_field("missing"), None);
        assert_eq!(artifact.metadata.len(), 1);
    }

    #[test]
    fn test_artifact_input_from_option() {
        let artifact = Artifact::new("plan", "plan", serde_json::json!({}));
        let input: ArtifactInput<'_> = Some(&artifact).into();
        assert_eq!(input.available(), Some(&artifact));

        let absent: ArtifactInput<'_> = None.into();
        assert!(absent.is_absent());
        assert!(absent.available().is_none());
    }
}
