//! Sequential pipeline execution.

use crate::context::{PipelineContext, RunIdentity, StageContext};
use crate::core::StageResult;
use crate::errors::DevflowError;
use crate::events::{
    EventSink, PIPELINE_CLEANUP, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_STARTED,
    STAGE_COMPLETED, STAGE_DEGRADED, STAGE_STARTED,
};
use crate::session::{SessionFactory, SessionSlot};
use crate::stages::Stage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What a run operates on.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    /// The transcript to process.
    pub transcript_path: PathBuf,
    /// Where generated documents are written.
    pub output_dir: PathBuf,
    /// Fixed identity, mainly for tests. A fresh one is used when absent.
    pub identity: Option<RunIdentity>,
}

impl PipelineInput {
    /// Creates an input.
    #[must_use]
    pub fn new(transcript_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            transcript_path: transcript_path.into(),
            output_dir: output_dir.into(),
            identity: None,
        }
    }

    /// Pins the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// Outcome of a completed run.
///
/// Serializes flat: `workflow_id`, `output_dir`, then one entry per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// `workflow_YYYYmmdd_HHMMSS`.
    pub workflow_id: String,
    /// Output directory of the run.
    pub output_dir: String,
    /// Stage results in execution order.
    #[serde(flatten)]
    pub stages: IndexMap<String, Value>,
}

impl FinalResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            output_dir: output_dir.into(),
            stages: IndexMap::new(),
        }
    }

    fn from_context(ctx: &PipelineContext) -> Self {
        Self {
            workflow_id: ctx.identity().workflow_id(),
            output_dir: ctx.output_dir().display().to_string(),
            stages: ctx.results(),
        }
    }

    /// Returns a stage's result.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Value> {
        self.stages.get(name)
    }

    /// Names of the stages whose result carries an error indicator.
    #[must_use]
    pub fn degraded_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|(_, value)| StageResult::from_value((*value).clone()).is_failure())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A validated, ordered list of stages plus the session they share.
///
/// Build one with [`PipelineBuilder`](super::PipelineBuilder).
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    session_factory: Arc<dyn SessionFactory>,
    event_sink: Arc<dyn EventSink>,
    slot: SessionSlot,
}

impl Pipeline {
    pub(super) fn new(
        name: String,
        stages: Vec<Arc<dyn Stage>>,
        session_factory: Arc<dyn SessionFactory>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            stages,
            session_factory,
            event_sink,
            slot: SessionSlot::new(),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order.
    ///
    /// Stage failures are recorded and the run continues. The session is
    /// released before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `DevflowError::Setup` when the session cannot be opened, and
    /// `DevflowError::DataConflict` if a stage key is written twice.
    pub async fn run(&self, input: &PipelineInput) -> Result<FinalResult, DevflowError> {
        let identity = input.identity.clone().unwrap_or_default();
        let ctx = Arc::new(
            PipelineContext::new(identity.clone(), &input.transcript_path, &input.output_dir)
                .with_event_sink(self.event_sink.clone()),
        );
        let workflow_id = identity.workflow_id();
        ctx.try_emit_event(
            PIPELINE_STARTED,
            Some(json!({
                "pipeline": self.name,
                "workflow_id": workflow_id,
                "stages": self.stages.len(),
            })),
        );

        let session = match self.session_factory.open(&identity, &input.output_dir).await {
            Ok(session) => session,
            Err(e) => {
                error!(workflow_id = %workflow_id, error = %e, "Session setup failed");
                ctx.try_emit_event(PIPELINE_FAILED, Some(json!({"error": e.to_string()})));
                self.cleanup().await;
                return Err(e);
            }
        };
        if let Some(stale) = self.slot.install(session) {
            warn!(session = %stale.label(), "Releasing session left by an earlier run");
            if let Err(e) = stale.release().await {
                warn!(session = %stale.label(), error = %e, "Stale session release failed");
            }
        }

        let started = Instant::now();
        let outcome = self.execute_stages(&ctx).await;
        self.cleanup().await;

        match outcome {
            Ok(()) => {
                let result = FinalResult::from_context(&ctx);
                let degraded = result.degraded_stages();
                info!(
                    workflow_id = %workflow_id,
                    stages = result.stages.len(),
                    degraded = degraded.len(),
                    duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Pipeline completed"
                );
                ctx.try_emit_event(
                    PIPELINE_COMPLETED,
                    Some(json!({"workflow_id": workflow_id, "degraded": degraded})),
                );
                Ok(result)
            }
            Err(e) => {
                error!(workflow_id = %workflow_id, error = %e, "Pipeline aborted");
                ctx.try_emit_event(PIPELINE_FAILED, Some(json!({"error": e.to_string()})));
                Err(e)
            }
        }
    }

    async fn execute_stages(&self, ctx: &Arc<PipelineContext>) -> Result<(), DevflowError> {
        for stage in &self.stages {
            let name = stage.name();
            ctx.try_emit_event(STAGE_STARTED, Some(json!({"stage": name})));
            let started = Instant::now();

            let result = stage.execute(&StageContext::new(ctx.clone(), name)).await;

            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            if result.is_failure() {
                warn!(
                    stage = %name,
                    error = result.error().unwrap_or_default(),
                    "Stage degraded, continuing"
                );
                ctx.try_emit_event(
                    STAGE_DEGRADED,
                    Some(json!({
                        "stage": name,
                        "error": result.error(),
                        "duration_ms": duration_ms,
                    })),
                );
            } else {
                info!(stage = %name, duration_ms, "Stage completed");
                ctx.try_emit_event(
                    STAGE_COMPLETED,
                    Some(json!({"stage": name, "duration_ms": duration_ms})),
                );
            }
            ctx.record(name, result)?;
        }
        Ok(())
    }

    /// Releases the run's session.
    ///
    /// Safe to call any number of times, from any exit path; only the first
    /// call after a session was opened does anything. Returns true if this
    /// call released the session.
    pub async fn cleanup(&self) -> bool {
        let released = self.slot.release().await;
        if released {
            self.event_sink.try_emit(PIPELINE_CLEANUP, None);
        }
        released
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::{
        assert_stage_order, CountingSessionFactory, FailingStage, MockStage, RecordingStage,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn input() -> PipelineInput {
        PipelineInput::new("meeting.txt", "outputs")
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let factory = Arc::new(CountingSessionFactory::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new("t", factory.clone())
            .stage(Arc::new(RecordingStage::new("first", log.clone())))
            .stage(Arc::new(RecordingStage::new("second", log.clone())))
            .build()
            .unwrap();

        let result = pipeline.run(&input()).await.unwrap();
        assert_stage_order(&result, &["first", "second"]);
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(result.degraded_stages().is_empty());
        assert_eq!(result.output_dir, "outputs");
        assert_eq!(factory.session().release_count(), 1);

        assert!(!pipeline.cleanup().await);
        assert_eq!(factory.session().release_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_skip_later_stages() {
        let factory = Arc::new(CountingSessionFactory::new());
        let last = Arc::new(MockStage::new("last"));
        let pipeline = PipelineBuilder::new("t", factory.clone())
            .stage(Arc::new(MockStage::new("first")))
            .stage(Arc::new(FailingStage::new("middle", "boom")))
            .stage(last.clone())
            .build()
            .unwrap();

        let result = pipeline.run(&input()).await.unwrap();
        assert_stage_order(&result, &["first", "middle", "last"]);
        assert_eq!(result.degraded_stages(), vec!["middle"]);
        assert_eq!(result.stage("middle").unwrap()["error"], json!("boom"));
        assert_eq!(last.seen_keys(), vec![vec!["first".to_string(), "middle".to_string()]]);
        assert_eq!(factory.session().release_count(), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_is_fatal_and_runs_no_stage() {
        let factory = Arc::new(CountingSessionFactory::failing("model API key missing"));
        let stage = Arc::new(MockStage::new("first"));
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("t", factory.clone())
            .stage(stage.clone())
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        let err = pipeline.run(&input()).await.unwrap_err();
        assert!(matches!(err, DevflowError::Setup(_)));
        assert_eq!(stage.call_count(), 0);
        assert_eq!(factory.session().release_count(), 0);
        assert_eq!(sink.event_types(), vec![PIPELINE_STARTED, PIPELINE_FAILED]);
        assert!(!pipeline.cleanup().await);
    }

    #[tokio::test]
    async fn test_event_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("t", Arc::new(CountingSessionFactory::new()))
            .stage(Arc::new(MockStage::new("ok")))
            .stage(Arc::new(FailingStage::new("bad", "x")))
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        pipeline.run(&input()).await.unwrap();
        assert_eq!(
            sink.event_types(),
            vec![
                PIPELINE_STARTED,
                STAGE_STARTED,
                STAGE_COMPLETED,
                STAGE_STARTED,
                STAGE_DEGRADED,
                PIPELINE_CLEANUP,
                PIPELINE_COMPLETED,
            ]
        );
    }

    #[tokio::test]
    async fn test_final_result_serializes_flat() {
        let identity = RunIdentity::new();
        let pipeline = PipelineBuilder::new("t", Arc::new(CountingSessionFactory::new()))
            .stage(Arc::new(MockStage::new("transcript")))
            .build()
            .unwrap();

        let result = pipeline
            .run(&input().with_identity(identity.clone()))
            .await
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["workflow_id"], json!(identity.workflow_id()));
        assert_eq!(value["transcript"]["stage"], json!("transcript"));
    }
}
