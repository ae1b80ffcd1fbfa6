//! Pipeline lifecycle events.
//!
//! The runner reports its progress through an [`EventSink`]. The binary
//! installs a [`LoggingEventSink`]; tests use a [`CollectingEventSink`] to
//! assert on ordering.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted once before setup.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted before each stage executes.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted when a stage result carries no error indicator.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted when a stage recorded a failure and the run continues degraded.
pub const STAGE_DEGRADED: &str = "stage.degraded";
/// Emitted when the session handle has been released.
pub const PIPELINE_CLEANUP: &str = "pipeline.cleanup";
/// Emitted after the last stage.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted when setup fails.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
