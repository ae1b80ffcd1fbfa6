//! Pull request for the feature branch.

use super::common::{self, file_bullets, file_records, ProjectInfo};
use super::{Stage, IMPLEMENTATION, PULL_REQUEST, REPO_INFO, TESTS};
use crate::collaborators::{ChangeRequest, Collaborators};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Opens a pull request from the feature branch into the default branch.
#[derive(Debug, Clone)]
pub struct PullRequestStage {
    collaborators: Collaborators,
}

impl PullRequestStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    fn feature_branch(&self, ctx: &StageContext) -> Option<String> {
        let repo = ctx.prior(REPO_INFO);
        let branch = repo
            .pointer("/branch_info/branch_name")
            .and_then(serde_json::Value::as_str)
            .filter(|b| !b.trim().is_empty())?;
        (branch != self.collaborators.source_control.default_branch()).then(|| branch.to_string())
    }

    fn body(ctx: &StageContext, info: &ProjectInfo) -> String {
        let implementation = file_records(&ctx.prior(IMPLEMENTATION), "files_created");
        let tests = file_records(&ctx.prior(TESTS), "test_files");
        format!(
            "## AI-Generated Windows Implementation\n\n\
             Project: **{}**\n\n\
             ### Implementation files ({})\n{}\n\n\
             ### Test files ({})\n{}\n\n\
             Generated by devflow run `{}`. Please review before merging.",
            info.project_name,
            implementation.len(),
            file_bullets(&implementation),
            tests.len(),
            file_bullets(&tests),
            ctx.identity().workflow_id(),
        )
    }

    async fn run(&self, ctx: &StageContext, head: String) -> Result<StageResult, CollaboratorError> {
        let info = ProjectInfo::from_context(ctx);
        let request = ChangeRequest {
            title: format!("AI-Generated: {}", info.project_name),
            body: Self::body(ctx, &info),
            head,
            base: self.collaborators.source_control.default_branch(),
        };
        let created = self
            .collaborators
            .source_control
            .open_change_request(&request)
            .await?;
        info!(number = created.number, url = %created.url, "Opened pull request");
        Ok(StageResult::success(json!({
            "pr_url": created.url,
            "pr_number": created.number,
            "title": request.title,
            "source_branch": request.head,
            "target_branch": request.base,
        })))
    }
}

#[async_trait]
impl Stage for PullRequestStage {
    fn name(&self) -> &str {
        PULL_REQUEST
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let Some(head) = self.feature_branch(ctx) else {
            return StageResult::failure(
                "No feature branch found",
                "Failed to create pull request: no feature branch found",
            );
        };
        match self.run(ctx, head).await {
            Ok(result) => result,
            Err(e) => common::failure(PULL_REQUEST, "create pull request", &e),
        }
    }
}
