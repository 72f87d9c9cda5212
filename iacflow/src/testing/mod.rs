//! Testing utilities for iacflow pipelines.
//!
//! This module provides:
//! - Mock adapters and an annotation sink that always fails
//! - Assertions over pipeline results

mod assertions;
mod mocks;

pub use assertions::{
    assert_artifacts, assert_has_artifact, assert_pipeline_status, assert_stage_status,
    assert_stages_ran,
};
pub use mocks::{ExecutionLog, MockAdapter, MockCall, RecordingAdapter, RejectingAnnotationSink};
