//! Core domain model types for iacflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Failure policies and stage/run statuses
//! - Artifacts and the absent sentinel seen by consumers
//! - Scan findings and cost estimates
//! - Annotations and adapter outputs

mod annotation;
mod artifact;
mod output;
mod report;
mod status;

pub use annotation::{Annotation, AnnotationTarget};
pub use artifact::{Artifact, ArtifactInput};
pub use output::AdapterOutput;
pub use report::{severity_counts, CostEstimate, ScanFinding, Severity};
pub use status::{FailurePolicy, OverallStatus, StageStatus};
