//! Stage definitions.

use crate::core::FailurePolicy;
use crate::errors::{codes, ConfigurationError, ErrorInfo};
use crate::stages::StageAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Definition of a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    /// The unique name of the stage.
    pub name: String,
    /// Whether the stage runs when no enable flag overrides it.
    pub enabled: bool,
    /// Adapter parameters (e.g., `stack_dir`, `var_file`).
    pub inputs: BTreeMap<String, String>,
    /// Label of the artifact this stage produces, if any.
    pub produces: Option<String>,
    /// Names of upstream stages whose artifacts this stage reads.
    pub consumes: Vec<String>,
    /// What a failure of this stage does to the run.
    pub on_failure: FailurePolicy,
    /// Upper bound on the adapter call.
    pub timeout: Option<Duration>,
    /// Names of secrets the adapter may resolve.
    pub secrets: Vec<String>,
    /// The stage implementation.
    pub adapter: Arc<dyn StageAdapter>,
}

impl StageDefinition {
    /// Creates an enabled hard-fail stage with no inputs.
    #[must_use]
    pub fn new(name: impl Into<String>, adapter: Arc<dyn StageAdapter>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            inputs: BTreeMap::new(),
            produces: None,
            consumes: Vec::new(),
            on_failure: FailurePolicy::HardFail,
            timeout: None,
            secrets: Vec::new(),
            adapter,
        }
    }

    /// Sets the default enabled state.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds an input parameter.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Declares the artifact this stage produces.
    #[must_use]
    pub fn produces(mut self, label: impl Into<String>) -> Self {
        self.produces = Some(label.into());
        self
    }

    /// Declares an upstream stage whose artifact this stage reads.
    #[must_use]
    pub fn consumes(mut self, stage: impl Into<String>) -> Self {
        self.consumes.push(stage.into());
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Sets the stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Declares a secret the adapter may resolve.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>) -> Self {
        self.secrets.push(name.into());
        self
    }

    /// Checks the parts of the definition that need no other stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the stage consumes itself.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::new("Stage name cannot be empty").with_error_info(
                ErrorInfo::new(codes::EMPTY_NAME, "Empty stage name")
                    .with_fix_hint("Give every stage a non-blank, unique name."),
            ));
        }
        if self.consumes.contains(&self.name) {
            return Err(ConfigurationError::new(format!(
                "Stage '{}' cannot consume its own artifact",
                self.name
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(ErrorInfo::new(
                codes::SELF_REF,
                format!("'{}' consumes itself", self.name),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAdapter;

    #[test]
    fn test_stage_definition_builder() {
        let def = StageDefinition::new("apply", Arc::new(MockAdapter::succeeding()))
            .enabled(false)
            .with_input("stack_dir", "infra")
            .consumes("plan")
            .on_failure(FailurePolicy::SoftFail)
            .with_timeout(Duration::from_secs(600))
            .with_secret("ARM_CLIENT_SECRET");

        assert!(!def.enabled);
        assert_eq!(def.inputs.get("stack_dir").map(String::as_str), Some("infra"));
        assert_eq!(def.consumes, vec!["plan".to_string()]);
        assert_eq!(def.on_failure, FailurePolicy::SoftFail);
        assert_eq!(def.timeout, Some(Duration::from_secs(600)));
        assert!(def.produces.is_none());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_and_self_reference() {
        let blank = StageDefinition::new("  ", Arc::new(MockAdapter::succeeding()));
        assert_eq!(blank.validate().unwrap_err().code(), Some(codes::EMPTY_NAME));

        let looped = StageDefinition::new("plan", Arc::new(MockAdapter::succeeding()))
            .produces("plan")
            .consumes("plan");
        assert_eq!(looped.validate().unwrap_err().code(), Some(codes::SELF_REF));
    }
}
