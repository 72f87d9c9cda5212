//! # iacflow
//!
//! Conditional multi-stage orchestration for infrastructure-as-code pipelines.
//!
//! iacflow runs a fixed, ordered sequence of stages (plan, security scan,
//! cost estimate, apply, checks) where every stage delegates to an external
//! tool. The crate's own logic is the orchestrator:
//!
//! - **Gating**: stages are enabled or disabled once, at configure time
//! - **Artifact forwarding**: producers hand opaque payloads to later consumers
//! - **Failure policies**: `hard_fail`, `soft_fail` and `report_only` fold
//!   into one overall status
//! - **Annotations**: PR comments, SARIF reports and stored files, delivered
//!   without ever affecting control flow
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iacflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::from_file("iacflow.json")?;
//! let run = standard_pipeline(&config, StandardAdapters::for_config(&config))?;
//!
//! let result = Orchestrator::from_config(&config)
//!     .with_annotation_sink(Arc::new(LoggingAnnotationSink))
//!     .execute(&run)
//!     .await;
//! std::process::exit(result.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod annotations;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod tools;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        ApplyAdapter, CheckAdapter, CostAdapter, PlanAdapter, ScanAdapter, Scanner,
    };
    pub use crate::annotations::{
        AnnotationSink, DirectoryAnnotationSink, LoggingAnnotationSink, NoOpAnnotationSink,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{DeploymentScope, IacTool, PipelineConfig};
    pub use crate::core::{
        AdapterOutput, Annotation, AnnotationTarget, Artifact, ArtifactInput, CostEstimate,
        FailurePolicy, OverallStatus, ScanFinding, Severity, StageStatus,
    };
    pub use crate::credentials::{CredentialProvider, EnvCredentialProvider, SecretValue};
    pub use crate::errors::{AdapterError, ConfigurationError, IacflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{
        configure, standard_pipeline, Orchestrator, PipelineResult, PipelineRun,
        StageDefinition, StageOutcome, StandardAdapters,
    };
    pub use crate::stages::{StageAdapter, StageContext};
    pub use crate::tools::ToolCommand;
}
