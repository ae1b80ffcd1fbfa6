//! Execution contexts for pipeline and stage execution.

use super::{ContextBag, RunIdentity};
use crate::core::StageResult;
use crate::errors::DataConflictError;
use crate::events::{EventSink, NoOpEventSink};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The shared context for one pipeline run.
///
/// Holds the run identity, the input and output locations, and the
/// append-only bag that maps each stage name to the result it wrote.
pub struct PipelineContext {
    /// Run identity.
    identity: RunIdentity,
    /// Location of the transcript being processed.
    transcript_path: PathBuf,
    /// Directory that receives generated documents.
    output_dir: PathBuf,
    /// Stage results, keyed by stage name.
    results: ContextBag,
    /// Event sink for emitting events.
    event_sink: Arc<dyn EventSink>,
}

impl PipelineContext {
    /// Creates a new pipeline context.
    #[must_use]
    pub fn new(
        identity: RunIdentity,
        transcript_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identity,
            transcript_path: transcript_path.into(),
            output_dir: output_dir.into(),
            results: ContextBag::new(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the transcript location.
    #[must_use]
    pub fn transcript_path(&self) -> &Path {
        &self.transcript_path
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns a copy of a stage's result.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<Value> {
        self.results.get(stage)
    }

    /// Records the result a stage produced.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the stage already wrote its entry.
    pub fn record(&self, stage: &str, result: StageResult) -> Result<(), DataConflictError> {
        self.results.set(stage, result.into_value())
    }

    /// Returns every recorded result in execution order.
    #[must_use]
    pub fn results(&self) -> IndexMap<String, Value> {
        self.results.snapshot()
    }

    /// Tries to emit an event.
    pub fn try_emit_event(&self, event_type: &str, data: Option<Value>) {
        self.event_sink.try_emit(event_type, data);
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("workflow_id", &self.identity.workflow_id())
            .field("transcript_path", &self.transcript_path)
            .field("output_dir", &self.output_dir)
            .field("stages", &self.results.keys())
            .finish()
    }
}

/// The read-only view a stage gets while it executes.
///
/// A stage can read any earlier result but cannot write: the runner records
/// the stage's returned result after `execute` completes.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline: Arc<PipelineContext>,
    stage_name: String,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(pipeline: Arc<PipelineContext>, stage_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            stage_name: stage_name.into(),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the pipeline context.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineContext {
        &self.pipeline
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        self.pipeline.identity()
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        self.pipeline.output_dir()
    }

    /// Returns the transcript location.
    #[must_use]
    pub fn transcript_path(&self) -> &Path {
        self.pipeline.transcript_path()
    }

    /// Returns an earlier stage's result, or an empty object if it is absent.
    #[must_use]
    pub fn prior(&self, stage: &str) -> Value {
        self.pipeline
            .result(stage)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}
