//! Pipeline configuration surface.
//!
//! A [`PipelineConfig`] is usually deserialized from JSON and then patched
//! with `IACFLOW_*` environment overrides. Enable flags are resolved once,
//! when the run is configured.

use crate::core::{AnnotationTarget, Severity};
use crate::errors::ConfigLoadError;
use crate::pipeline::standard::stage_names;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "IACFLOW_";

/// The IaC tool family a stack is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IacTool {
    /// Terraform configurations, planned with `terraform plan`.
    #[default]
    Terraform,
    /// Bicep templates, planned with `az deployment what-if`.
    Bicep,
}

impl IacTool {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "terraform" | "tf" => Some(Self::Terraform),
            "bicep" | "arm" => Some(Self::Bicep),
            _ => None,
        }
    }
}

/// Scope of an Azure deployment what-if.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeploymentScope {
    /// Deploy into a resource group.
    #[default]
    #[serde(rename = "resourceGroup")]
    ResourceGroup,
    /// Deploy at subscription level.
    #[serde(rename = "subscription")]
    Subscription,
}

impl fmt::Display for DeploymentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceGroup => write!(f, "resourceGroup"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

impl DeploymentScope {
    /// Returns the `az deployment` sub-command for this scope.
    #[must_use]
    pub fn az_subcommand(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "group",
            Self::Subscription => "sub",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "resourceGroup" | "resource_group" | "group" => Some(Self::ResourceGroup),
            "subscription" | "sub" => Some(Self::Subscription),
            _ => None,
        }
    }
}

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target environment (e.g., "dev", "prod").
    pub environment: String,
    /// Tool family of the stack.
    #[serde(default)]
    pub tool: IacTool,
    /// Directory holding the stack to plan.
    #[serde(default = "default_stack_dir")]
    pub stack_dir: PathBuf,
    /// Optional variables file passed to the plan tool.
    #[serde(default)]
    pub var_file: Option<PathBuf>,
    /// Run the security scan stage.
    #[serde(default = "default_true")]
    pub enable_security_scan: bool,
    /// Run the cost estimate stage.
    #[serde(default)]
    pub enable_cost_estimate: bool,
    /// Run the apply stage after a successful plan.
    #[serde(default)]
    pub enable_apply: bool,
    /// Run pre-commit checks before planning.
    #[serde(default)]
    pub enable_pre_commit: bool,
    /// Deliver SARIF security reports.
    #[serde(default)]
    pub upload_sarif: bool,
    /// Deliver pull request comments.
    #[serde(default)]
    pub pr_comment: bool,
    /// Currency for cost estimates.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Scope for what-if deployments.
    #[serde(default)]
    pub deployment_scope: DeploymentScope,
    /// Per-stage timeout in seconds.
    #[serde(default)]
    pub stage_timeout_seconds: Option<f64>,
    /// Lowest finding severity that fails the scan stage.
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: Severity,
    /// Extra inputs passed to every stage (e.g., `resource_group`, `location`).
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Secret names the tool stages may resolve.
    #[serde(default)]
    pub secrets: Vec<String>,
}

fn default_stack_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_severity_threshold() -> Severity {
    Severity::High
}

impl PipelineConfig {
    /// Creates a configuration for `environment` with all defaults.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            tool: IacTool::default(),
            stack_dir: default_stack_dir(),
            var_file: None,
            enable_security_scan: default_true(),
            enable_cost_estimate: false,
            enable_apply: false,
            enable_pre_commit: false,
            upload_sarif: false,
            pr_comment: false,
            currency: default_currency(),
            deployment_scope: DeploymentScope::default(),
            stage_timeout_seconds: None,
            severity_threshold: default_severity_threshold(),
            inputs: BTreeMap::new(),
            secrets: Vec::new(),
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] on malformed JSON or a missing
    /// `environment`, and [`ConfigLoadError::InvalidValue`] for a stage
    /// timeout that is not a positive, representable number of seconds.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if let Some(seconds) = self.stage_timeout_seconds {
            if timeout_from_secs(seconds).is_none() {
                return Err(ConfigLoadError::InvalidValue {
                    field: "stage_timeout_seconds".to_string(),
                    value: seconds.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Sets the stack directory.
    #[must_use]
    pub fn with_stack_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stack_dir = dir.into();
        self
    }

    /// Sets the variables file.
    #[must_use]
    pub fn with_var_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.var_file = Some(file.into());
        self
    }

    /// Applies `IACFLOW_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::InvalidOverride`] for a malformed value.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigLoadError> {
        self.apply_env_overrides(std::env::vars())
    }

    /// Applies `IACFLOW_*` overrides from `vars`. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::InvalidOverride`] for a malformed value.
    pub fn apply_env_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigLoadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            let invalid = || ConfigLoadError::InvalidOverride {
                key: key.to_string(),
                value: value.to_string(),
            };

            match name {
                "ENVIRONMENT" => self.environment = value.to_string(),
                "TOOL" => self.tool = IacTool::parse(value).ok_or_else(invalid)?,
                "STACK_DIR" => self.stack_dir = PathBuf::from(value),
                "VAR_FILE" => {
                    self.var_file = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                "CURRENCY" => self.currency = value.to_string(),
                "ENABLE_SECURITY_SCAN" => {
                    self.enable_security_scan = parse_bool(value).ok_or_else(invalid)?;
                }
                "ENABLE_COST_ESTIMATE" => {
                    self.enable_cost_estimate = parse_bool(value).ok_or_else(invalid)?;
                }
                "ENABLE_APPLY" => self.enable_apply = parse_bool(value).ok_or_else(invalid)?,
                "ENABLE_PRE_COMMIT" => {
                    self.enable_pre_commit = parse_bool(value).ok_or_else(invalid)?;
                }
                "UPLOAD_SARIF" => self.upload_sarif = parse_bool(value).ok_or_else(invalid)?,
                "PR_COMMENT" => self.pr_comment = parse_bool(value).ok_or_else(invalid)?,
                "DEPLOYMENT_SCOPE" => {
                    self.deployment_scope = DeploymentScope::parse(value).ok_or_else(invalid)?;
                }
                "STAGE_TIMEOUT_SECONDS" => {
                    let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
                    timeout_from_secs(seconds).ok_or_else(invalid)?;
                    self.stage_timeout_seconds = Some(seconds);
                }
                "SEVERITY_THRESHOLD" => {
                    let severity = Severity::parse_lossy(value);
                    if severity == Severity::Unknown {
                        return Err(invalid());
                    }
                    self.severity_threshold = severity;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns the stage timeout, if configured and representable.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds.and_then(timeout_from_secs)
    }

    /// Returns the enable flags for the standard stages.
    #[must_use]
    pub fn enable_flags(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            (stage_names::PRE_COMMIT.to_string(), self.enable_pre_commit),
            (stage_names::PLAN.to_string(), true),
            (stage_names::SECURITY_SCAN.to_string(), self.enable_security_scan),
            (stage_names::COST_ESTIMATE.to_string(), self.enable_cost_estimate),
            (stage_names::APPLY.to_string(), self.enable_apply),
        ])
    }

    /// Returns the annotation targets that may receive annotations.
    #[must_use]
    pub fn annotation_targets(&self) -> BTreeSet<AnnotationTarget> {
        let mut targets = BTreeSet::from([AnnotationTarget::ArtifactStore]);
        if self.pr_comment {
            targets.insert(AnnotationTarget::PullRequest);
        }
        if self.upload_sarif {
            targets.insert(AnnotationTarget::SecurityReport);
        }
        targets
    }
}

/// Converts seconds to a timeout. Non-positive, NaN, infinite and
/// overflowing values yield `None`.
fn timeout_from_secs(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
