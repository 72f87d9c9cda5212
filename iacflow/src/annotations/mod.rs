//! Annotation delivery and rendering.
//!
//! This module provides:
//! - The [`AnnotationSink`] trait and its implementations
//! - Markdown renderers for plan, scan and cost comments
//! - SARIF 2.1.0 rendering for security reports

pub mod render;
pub mod sarif;
mod sink;

pub use sink::{
    AnnotationSink, CollectingAnnotationSink, DirectoryAnnotationSink, LoggingAnnotationSink,
    NoOpAnnotationSink,
};
