//! Lifecycle events emitted by the orchestrator.
//!
//! Events are for observability only. Sinks must never fail the run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod event_types {
    /// A run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A run finished.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A run was cancelled between stages.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
    /// A stage adapter was invoked.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage adapter succeeded.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage adapter failed or timed out.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage was not run.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
}
