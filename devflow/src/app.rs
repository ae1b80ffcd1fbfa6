//! Wiring for a complete workflow run.

use crate::collaborators::Collaborators;
use crate::config::{process_env, Settings};
use crate::errors::DevflowError;
use crate::events::{EventSink, LoggingEventSink};
use crate::observability::write_summary;
use crate::pipeline::{FinalResult, Pipeline, PipelineBuilder, PipelineInput};
use crate::session::WorkspaceSessionFactory;
use crate::stages::{workflow, WorkflowOptions};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the assembled pipeline.
pub const PIPELINE_NAME: &str = "devflow";

/// Builds the workflow pipeline from settings and collaborators.
pub fn build_pipeline(
    settings: &Settings,
    collaborators: &Collaborators,
    event_sink: Arc<dyn EventSink>,
) -> Result<Pipeline, DevflowError> {
    let options = WorkflowOptions {
        top_k: settings.knowledge.top_k,
        feature_name: settings.integrations.git.feature_name.clone(),
    };
    let factory = WorkspaceSessionFactory::new(
        &settings.integrations.git.work_directory,
        collaborators.model.clone(),
    );
    let pipeline = PipelineBuilder::new(PIPELINE_NAME, Arc::new(factory))
        .stages(workflow(collaborators, &options))
        .with_event_sink(event_sink)
        .build()?;
    Ok(pipeline)
}

/// Loads settings and assembles the pipeline against the real integrations.
pub fn prepare(config_path: &Path) -> Result<Pipeline, DevflowError> {
    let settings = Settings::load(config_path)?;
    let collaborators = Collaborators::from_settings(&settings, &process_env);
    build_pipeline(
        &settings,
        &collaborators,
        Arc::new(LoggingEventSink::default()),
    )
}

/// Runs a prepared pipeline and writes the summary report.
///
/// A summary that cannot be written is logged, not returned.
pub async fn run_workflow(
    pipeline: &Pipeline,
    transcript_path: &Path,
    output_dir: &Path,
) -> Result<FinalResult, DevflowError> {
    let input = PipelineInput::new(transcript_path, output_dir);
    let result = pipeline.run(&input).await?;

    match write_summary(&result, output_dir) {
        Ok(path) => info!(path = %path.display(), "Wrote workflow summary"),
        Err(error) => warn!(error = %error, "Could not write workflow summary"),
    }
    Ok(result)
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every stage ran.
    Finished(FinalResult),
    /// Shutdown fired first. The session has been released.
    Interrupted,
}

/// Runs the workflow until it finishes or `shutdown` resolves.
///
/// On shutdown the in-flight stage is dropped and the pipeline's cleanup
/// runs before this returns.
pub async fn run_until_shutdown<F>(
    pipeline: &Pipeline,
    transcript_path: &Path,
    output_dir: &Path,
    shutdown: F,
) -> Result<RunOutcome, DevflowError>
where
    F: Future<Output = ()>,
{
    let finished = tokio::select! {
        res = run_workflow(pipeline, transcript_path, output_dir) => Some(res),
        () = shutdown => None,
    };

    match finished {
        Some(res) => res.map(RunOutcome::Finished),
        None => {
            warn!("Interrupted, releasing workspace");
            pipeline.cleanup().await;
            Ok(RunOutcome::Interrupted)
        }
    }
}
