//! Pipeline configuration and execution.
//!
//! This module provides:
//! - Stage definitions and run configuration with validation
//! - The sequential orchestrator
//! - The standard IaC pipeline layout

mod builder;
mod executor;
mod result;
mod run;
mod spec;
pub mod standard;


pub use builder::configure;
pub use executor::Orchestrator;
pub use result::{PipelineResult, StageOutcome};
pub use run::PipelineRun;
pub use spec::StageDefinition;
pub use standard::{standard_pipeline, stage_names, StandardAdapters};
