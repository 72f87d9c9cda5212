//! Run configuration with validation.

use super::{PipelineRun, StageDefinition};
use crate::errors::{codes, ConfigurationError, ErrorInfo};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Builds a [`PipelineRun`] from ordered stage definitions.
///
/// `enable_flags` maps stage names to their enabled state; a stage missing
/// from the map keeps the `enabled` value of its definition. Flags are
/// resolved here, once.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the environment is blank, a stage name
/// is blank or repeated, or a stage consumes an artifact from itself, from a
/// stage defined later, from an unknown stage, or from a stage that declares
/// no artifact.
pub fn configure(
    environment: impl Into<String>,
    definitions: Vec<StageDefinition>,
    enable_flags: &BTreeMap<String, bool>,
) -> Result<PipelineRun, ConfigurationError> {
    let environment = environment.into();
    if environment.trim().is_empty() {
        return Err(
            ConfigurationError::new("Environment name cannot be empty").with_error_info(
                ErrorInfo::new(codes::EMPTY_NAME, "Empty environment name")
                    .with_fix_hint("Set `environment` in the pipeline configuration."),
            ),
        );
    }

    let positions: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, def)| (def.name.as_str(), idx))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, def) in definitions.iter().enumerate() {
        def.validate()?;

        if !seen.insert(def.name.as_str()) {
            return Err(ConfigurationError::new(format!(
                "Stage '{}' is defined more than once",
                def.name
            ))
            .with_stages(vec![def.name.clone()])
            .with_error_info(
                ErrorInfo::new(codes::DUPLICATE_STAGE, format!("Duplicate stage '{}'", def.name))
                    .with_fix_hint("Rename one of the stages."),
            ));
        }

        for producer in &def.consumes {
            check_reference(&definitions, &positions, idx, def, producer)?;
        }
    }

    for name in enable_flags.keys() {
        if !seen.contains(name.as_str()) {
            warn!(stage = %name, "enable flag for unknown stage ignored");
        }
    }

    let stages: Vec<StageDefinition> = definitions
        .into_iter()
        .map(|mut def| {
            if let Some(&enabled) = enable_flags.get(&def.name) {
                def.enabled = enabled;
            }
            def
        })
        .collect();

    debug!(
        environment = %environment,
        stages = stages.len(),
        enabled = stages.iter().filter(|s| s.enabled).count(),
        "pipeline configured"
    );
    Ok(PipelineRun::new(environment, stages))
}

fn check_reference(
    definitions: &[StageDefinition],
    positions: &HashMap<&str, usize>,
    idx: usize,
    consumer: &StageDefinition,
    producer: &str,
) -> Result<(), ConfigurationError> {
    let stages = vec![consumer.name.clone(), producer.to_string()];
    match positions.get(producer) {
        None => Err(ConfigurationError::new(format!(
            "Stage '{}' consumes unknown stage '{producer}'",
            consumer.name
        ))
        .with_stages(stages)
        .with_error_info(
            ErrorInfo::new(codes::UNKNOWN_REF, format!("Stage '{producer}' not found"))
                .with_fix_hint("Define the producing stage before its consumers.")
                .with_context_entry("consumer", &consumer.name),
        )),
        Some(&pos) if pos > idx => Err(ConfigurationError::new(format!(
            "Stage '{}' consumes '{producer}', which is defined later",
            consumer.name
        ))
        .with_stages(stages)
        .with_error_info(
            ErrorInfo::new(
                codes::FORWARD_REF,
                format!("'{producer}' is not strictly upstream of '{}'", consumer.name),
            )
            .with_fix_hint("Move the producing stage before the stage that consumes it.")
            .with_context_entry("consumer", &consumer.name),
        )),
        Some(&pos) if definitions[pos].produces.is_none() => Err(ConfigurationError::new(format!(
            "Stage '{}' consumes '{producer}', which produces no artifact",
            consumer.name
        ))
        .with_stages(stages)
        .with_error_info(
            ErrorInfo::new(codes::NOT_PRODUCER, format!("'{producer}' declares no artifact"))
                .with_fix_hint("Declare `produces` on the upstream stage or drop the dependency."),
        )),
        Some(_) => Ok(()),
    }
}
