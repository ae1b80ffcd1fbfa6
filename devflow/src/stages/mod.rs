//! Stage trait and the workflow stages.
//!
//! Stages are the units of work in a devflow pipeline. Each one reads earlier
//! results from its [`StageContext`] and returns a single [`StageResult`] that
//! the runner records under the stage's name.

mod common;
mod design;
mod documentation;
mod implementation;
mod notification;
mod pages;
mod pull_request;
mod repository;
mod requirements;
mod test_suite;
mod transcript;

pub use common::{file_records, FileRecord, ProjectInfo};
pub use design::DesignStage;
pub use documentation::DocumentationStage;
pub use implementation::ImplementationStage;
pub use notification::NotificationStage;
pub use pages::{PageKindStage, PageStage};
pub use pull_request::PullRequestStage;
pub use repository::RepositoryStage;
pub use requirements::RequirementsStage;
pub use test_suite::TestSuiteStage;
pub use transcript::TranscriptStage;

use crate::collaborators::Collaborators;
use crate::context::StageContext;
use crate::core::StageResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Context key of the transcript stage.
pub const TRANSCRIPT: &str = "transcript";
/// Context key of the project folder page stage.
pub const CONFLUENCE_FOLDER: &str = "confluence_folder";
/// Context key of the requirements stage.
pub const REQUIREMENTS: &str = "requirements";
/// Context key of the requirements page stage.
pub const REQUIREMENTS_CONFLUENCE: &str = "requirements_confluence";
/// Context key of the design stage.
pub const DESIGN_SPEC: &str = "design_spec";
/// Context key of the design page stage.
pub const DESIGN_CONFLUENCE: &str = "design_confluence";
/// Context key of the repository stage.
pub const REPO_INFO: &str = "repo_info";
/// Context key of the implementation stage.
pub const IMPLEMENTATION: &str = "implementation";
/// Context key of the tests stage.
pub const TESTS: &str = "tests";
/// Context key of the documentation stage.
pub const DOCUMENTATION: &str = "documentation";
/// Context key of the pull request stage.
pub const PULL_REQUEST: &str = "pull_request";
/// Context key of the notification stage.
pub const NOTIFICATION: &str = "notification";

/// Workflow stage keys in execution order.
pub const WORKFLOW_STAGES: [&str; 12] = [
    TRANSCRIPT,
    CONFLUENCE_FOLDER,
    REQUIREMENTS,
    REQUIREMENTS_CONFLUENCE,
    DESIGN_SPEC,
    DESIGN_CONFLUENCE,
    REPO_INFO,
    IMPLEMENTATION,
    TESTS,
    DOCUMENTATION,
    PULL_REQUEST,
    NOTIFICATION,
];

/// Trait for pipeline stages.
///
/// A stage never returns an error: collaborator faults are caught inside the
/// stage and reported as a failed result, so later stages still run.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage, which is also its context key.
    fn name(&self) -> &str;

    /// Executes the stage.
    async fn execute(&self, ctx: &StageContext) -> StageResult;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        (self.func)(ctx)
    }
}

/// Knobs the workflow stages read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Knowledge hits per prompt.
    pub top_k: usize,
    /// Feature name used in the branch name.
    pub feature_name: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            feature_name: "windows-metrics".to_string(),
        }
    }
}

/// Builds the twelve workflow stages in execution order.
#[must_use]
pub fn workflow(collaborators: &Collaborators, options: &WorkflowOptions) -> Vec<Arc<dyn Stage>> {
    let c = collaborators;
    vec![
        Arc::new(TranscriptStage::new(c.clone(), options.top_k)),
        Arc::new(PageStage::new(PageKindStage::ProjectFolder, c.clone())),
        Arc::new(RequirementsStage::new(c.clone(), options.top_k)),
        Arc::new(PageStage::new(PageKindStage::Requirements, c.clone())),
        Arc::new(DesignStage::new(c.clone(), options.top_k)),
        Arc::new(PageStage::new(PageKindStage::Design, c.clone())),
        Arc::new(RepositoryStage::new(c.clone(), options.feature_name.clone())),
        Arc::new(ImplementationStage::new(c.clone(), options.top_k)),
        Arc::new(TestSuiteStage::new(c.clone(), options.top_k)),
        Arc::new(DocumentationStage::new(c.clone(), options.top_k)),
        Arc::new(PullRequestStage::new(c.clone())),
        Arc::new(NotificationStage::new(c.clone())),
    ]
}
