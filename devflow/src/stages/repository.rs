//! Working copy preparation.

use super::common::{self, non_empty_str};
use super::{Stage, REPO_INFO, TRANSCRIPT};
use crate::collaborators::Collaborators;
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::links;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Clones the repository, cuts a feature branch and lists its files.
#[derive(Debug, Clone)]
pub struct RepositoryStage {
    collaborators: Collaborators,
    feature_name: String,
}

impl RepositoryStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, feature_name: impl Into<String>) -> Self {
        Self {
            collaborators,
            feature_name: feature_name.into(),
        }
    }

    /// The configured repository, else a valid URL mentioned in the transcript.
    fn repository_url(&self, ctx: &StageContext) -> Option<String> {
        self.collaborators.source_control.repository_url().or_else(|| {
            let transcript = ctx.prior(TRANSCRIPT);
            non_empty_str(&transcript, "repository_url")
                .filter(|url| links::is_valid_url(url))
                .map(str::to_string)
        })
    }

    async fn run(&self, ctx: &StageContext, repo_url: &str) -> Result<StageResult, CollaboratorError> {
        let scm = &self.collaborators.source_control;
        let clone_info = scm.prepare_working_copy(repo_url).await?;
        let branch_info = scm.create_branch(&self.feature_name).await?;
        let repo_files = scm.list_files().await?;
        info!(
            run = %ctx.identity().workflow_id(),
            branch = %branch_info.branch_name,
            files = repo_files.len(),
            "Prepared working copy"
        );
        Ok(StageResult::success(json!({
            "clone_info": clone_info,
            "branch_info": branch_info,
            "repo_files": repo_files,
        })))
    }
}

#[async_trait]
impl Stage for RepositoryStage {
    fn name(&self) -> &str {
        REPO_INFO
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let Some(repo_url) = self.repository_url(ctx) else {
            return StageResult::failure(
                "No repository URL configured",
                "Failed to prepare repository: no repository URL configured",
            );
        };
        match self.run(ctx, &repo_url).await {
            Ok(result) => result,
            Err(e) => common::failure(REPO_INFO, "prepare repository", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_collaborators, stage_context};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_prepares_branch_and_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.source_control.add_file("src/metrics.c", "int main() {}");
        let ctx = stage_context(&dir.path().join("t.txt"), dir.path(), &[]);

        let result = RepositoryStage::new(collaborators, "windows-metrics")
            .execute(&ctx)
            .await;
        assert!(result.is_success());
        assert_eq!(result.get("repo_files"), Some(&json!(["src/metrics.c"])));
        let branch = result.get("branch_info").unwrap();
        assert!(branch["branch_name"]
            .as_str()
            .unwrap()
            .starts_with("ai_branch/windows-metrics-"));
        assert_eq!(
            result.get("clone_info").unwrap()["repo_url"],
            json!("https://git.test/acme/metrics")
        );
    }

    #[tokio::test]
    async fn test_transcript_url_is_used_when_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.source_control.set_repository_url(None);
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[(TRANSCRIPT, json!({"repository_url": "https://git.test/other/repo"}))],
        );

        let result = RepositoryStage::new(collaborators, "x").execute(&ctx).await;
        assert_eq!(
            result.get("clone_info").unwrap()["repo_url"],
            json!("https://git.test/other/repo")
        );
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.source_control.set_repository_url(None);
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[(TRANSCRIPT, json!({"repository_url": "not a url"}))],
        );

        let result = RepositoryStage::new(collaborators, "x").execute(&ctx).await;
        assert!(result.is_failure());
        assert_eq!(result.error(), Some("No repository URL configured"));
    }
}
