//! The canonical IaC change pipeline.
//!
//! `pre_commit → plan → security_scan → cost_estimate → apply`, with
//! gating and inputs taken from a [`PipelineConfig`].

use super::{configure, PipelineRun, StageDefinition};
use crate::adapters::{
    ApplyAdapter, CheckAdapter, CostAdapter, PlanAdapter, ScanAdapter, Scanner,
};
use crate::config::{IacTool, PipelineConfig};
use crate::core::FailurePolicy;
use crate::errors::ConfigurationError;
use crate::stages::StageAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Names of the standard stages.
pub mod stage_names {
    /// Repository hygiene checks.
    pub const PRE_COMMIT: &str = "pre_commit";
    /// Plan or what-if.
    pub const PLAN: &str = "plan";
    /// Static security scan.
    pub const SECURITY_SCAN: &str = "security_scan";
    /// Cost estimate.
    pub const COST_ESTIMATE: &str = "cost_estimate";
    /// Apply of the recorded plan.
    pub const APPLY: &str = "apply";
}

/// The adapters behind the standard stages.
#[derive(Debug, Clone)]
pub struct StandardAdapters {
    /// Adapter for [`stage_names::PRE_COMMIT`].
    pub pre_commit: Arc<dyn StageAdapter>,
    /// Adapter for [`stage_names::PLAN`].
    pub plan: Arc<dyn StageAdapter>,
    /// Adapter for [`stage_names::SECURITY_SCAN`].
    pub security_scan: Arc<dyn StageAdapter>,
    /// Adapter for [`stage_names::COST_ESTIMATE`].
    pub cost_estimate: Arc<dyn StageAdapter>,
    /// Adapter for [`stage_names::APPLY`].
    pub apply: Arc<dyn StageAdapter>,
}

impl StandardAdapters {
    /// Returns the tool adapters matching `config.tool`.
    ///
    /// Terraform stacks are scanned with tfsec, Bicep stacks with Checkov.
    #[must_use]
    pub fn for_config(config: &PipelineConfig) -> Self {
        let (plan, scanner, apply) = match config.tool {
            IacTool::Terraform => (
                PlanAdapter::terraform(),
                Scanner::Tfsec,
                ApplyAdapter::new(stage_names::PLAN),
            ),
            IacTool::Bicep => (
                PlanAdapter::az_what_if(config.deployment_scope),
                Scanner::Checkov,
                ApplyAdapter::az_deployment(stage_names::PLAN, config.deployment_scope),
            ),
        };
        Self {
            pre_commit: Arc::new(CheckAdapter::pre_commit()),
            plan: Arc::new(plan),
            security_scan: Arc::new(
                ScanAdapter::new(scanner).with_threshold(config.severity_threshold),
            ),
            cost_estimate: Arc::new(CostAdapter::new()),
            apply: Arc::new(apply),
        }
    }
}

/// Builds the standard run for `config`.
///
/// Every stage receives `stack_dir`, `var_file` (when set), `currency`,
/// `deployment_scope` and the configured extra inputs. The plan stage
/// produces the `plan` artifact, the cost stage the `cost_estimate`
/// artifact, and apply consumes the plan.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the environment is blank.
pub fn standard_pipeline(
    config: &PipelineConfig,
    adapters: StandardAdapters,
) -> Result<PipelineRun, ConfigurationError> {
    let inputs = stage_inputs(config);
    let tool_stage = |name: &str, adapter: Arc<dyn StageAdapter>| {
        let mut def = StageDefinition::new(name, adapter);
        def.inputs.clone_from(&inputs);
        def.timeout = config.stage_timeout();
        def
    };
    let with_secrets = |mut def: StageDefinition| {
        def.secrets.clone_from(&config.secrets);
        def
    };

    let definitions = vec![
        tool_stage(stage_names::PRE_COMMIT, adapters.pre_commit)
            .on_failure(FailurePolicy::SoftFail),
        with_secrets(tool_stage(stage_names::PLAN, adapters.plan))
            .produces(stage_names::PLAN)
            .on_failure(FailurePolicy::HardFail),
        tool_stage(stage_names::SECURITY_SCAN, adapters.security_scan)
            .on_failure(FailurePolicy::SoftFail),
        with_secrets(tool_stage(stage_names::COST_ESTIMATE, adapters.cost_estimate))
            .produces(stage_names::COST_ESTIMATE)
            .on_failure(FailurePolicy::ReportOnly),
        with_secrets(tool_stage(stage_names::APPLY, adapters.apply))
            .consumes(stage_names::PLAN)
            .on_failure(FailurePolicy::HardFail),
    ];

    configure(config.environment.clone(), definitions, &config.enable_flags())
}

fn stage_inputs(config: &PipelineConfig) -> BTreeMap<String, String> {
    let mut inputs = config.inputs.clone();
    inputs.insert(
        "stack_dir".to_string(),
        config.stack_dir.display().to_string(),
    );
    if let Some(var_file) = &config.var_file {
        inputs.insert("var_file".to_string(), var_file.display().to_string());
    }
    inputs.insert("currency".to_string(), config.currency.clone());
    inputs.insert(
        "deployment_scope".to_string(),
        config.deployment_scope.to_string(),
    );
    inputs
}
