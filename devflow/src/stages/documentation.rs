//! Implementation documentation.
//!
//! The document is written three times: locally, into the working copy as
//! `docs/README.md`, and as a page under the project folder. Only the local
//! write is required; the other two are recorded in the result when they fail.

use super::common::{
    self, file_bullets, file_records, files_context, non_empty_str, FileRecord, ProjectInfo,
};
use super::{Stage, CONFLUENCE_FOLDER, DOCUMENTATION, IMPLEMENTATION, TESTS};
use crate::collaborators::{ChatMessage, Collaborators, PageRequest};
use crate::context::StageContext;
use crate::contracts::DocumentationResponse;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::normalizer;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// File name of the local documentation.
pub const DOCUMENTATION_FILE: &str = "feature_documentation.md";
/// Location of the documentation inside the working copy.
pub const REPO_DOC_PATH: &str = "docs/README.md";

const SYSTEM_PROMPT: &str = "You are a Technical Writer documenting a Linux to Windows \
code conversion.

Return ONLY a JSON object of the form:
{\"documentation\": {\"content\": \"markdown document\", \"title\": \"page title\", \
\"summary\": \"one line summary\"}, \"api_docs\": [{\"function\": \"name\", \
\"description\": \"what it does\"}]}

The markdown should cover an overview, usage, the API, build steps and testing.";

/// Documents the generated files.
#[derive(Debug, Clone)]
pub struct DocumentationStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl DocumentationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, top_k: usize) -> Self {
        Self {
            collaborators,
            top_k,
        }
    }

    async fn run(
        &self,
        ctx: &StageContext,
        files: &[FileRecord],
    ) -> Result<StageResult, CollaboratorError> {
        let info = ProjectInfo::from_context(ctx);
        let tests = file_records(&ctx.prior(TESTS), "test_files");
        let scm = self.collaborators.source_control.as_ref();
        let code = files_context(scm, files).await;
        let (knowledge, _) = common::knowledge_context(
            self.collaborators.knowledge.as_ref(),
            "documentation Windows API conversion",
            self.top_k,
        );
        let messages = [
            ChatMessage::system(format!("{SYSTEM_PROMPT}\n\nReference material:\n{knowledge}")),
            ChatMessage::user(format!(
                "Project: {}\n\nImplementation files:\n{code}\nTest files:\n{}",
                info.project_name,
                file_bullets(&tests),
            )),
        ];

        let raw = self.collaborators.model.invoke(&messages).await?;
        let response = normalizer::normalize_as::<DocumentationResponse>(&raw).value;
        let body = response.documentation;
        let (content, title) = if body.content.trim().is_empty() {
            warn!("Documentation content empty, generating file list");
            (file_list_document(files), "AI-Generated Implementation Documentation".to_string())
        } else {
            (body.content, body.title)
        };

        let local = common::write_output(ctx, DOCUMENTATION_FILE, &content).await?;
        let mut result = StageResult::new()
            .with("local_doc_path", local.display().to_string())
            .with("api_docs", Value::Array(response.api_docs))
            .with("title", title)
            .with("summary", body.summary);

        result = match self.commit_readme(&content).await {
            Ok(()) => result.with("repo_doc_path", REPO_DOC_PATH),
            Err(e) => {
                warn!(error = %e, "Could not commit repository documentation");
                result
                    .with("repo_doc_path", "")
                    .with("repo_doc_error", e.to_string())
            }
        };

        let folder = ctx.prior(CONFLUENCE_FOLDER);
        let page_title = format!("{} - Implementation Documentation", info.base_title);
        let header = format!(
            "> Implementation documentation for **{}**. {} implementation files and {} test \
             files were generated on {}.\n\n",
            info.project_name,
            files.len(),
            tests.len(),
            ctx.identity().display_time(),
        );
        let request = PageRequest::document(&page_title, format!("{header}{content}"))
            .with_parent(non_empty_str(&folder, "parent_page_id"));
        result = match self.collaborators.documents.publish_page(&request).await {
            Ok(page) => {
                info!(page_id = %page.id, "Published implementation documentation");
                result
                    .with("confluence_page_url", page.url)
                    .with("confluence_page_id", page.id)
                    .with("confluence_success", true)
            }
            Err(e) => {
                warn!(error = %e, "Could not publish implementation documentation");
                result
                    .with("confluence_page_url", "")
                    .with("confluence_page_id", "")
                    .with("confluence_success", false)
                    .with("confluence_error", e.to_string())
            }
        };
        Ok(result)
    }

    async fn commit_readme(&self, content: &str) -> Result<(), CollaboratorError> {
        let scm = &self.collaborators.source_control;
        scm.write_file(REPO_DOC_PATH, content).await?;
        scm.commit_files(
            &[REPO_DOC_PATH.to_string()],
            "Add AI-generated implementation documentation",
        )
        .await?;
        Ok(())
    }
}

fn file_list_document(files: &[FileRecord]) -> String {
    format!(
        "# AI-Generated Implementation Documentation\n\n## Files\n\n{}\n",
        file_bullets(files)
    )
}

fn skipped(error: &str) -> StageResult {
    StageResult::new()
        .with("confluence_page_url", "")
        .with("local_doc_path", "")
        .with("api_docs", Value::Array(Vec::new()))
        .with("error", error)
}

#[async_trait]
impl Stage for DocumentationStage {
    fn name(&self) -> &str {
        DOCUMENTATION
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let files = file_records(&ctx.prior(IMPLEMENTATION), "files_created");
        if files.is_empty() {
            info!("No implementation files, skipping documentation");
            return skipped("No implementation files found");
        }
        match self.run(ctx, &files).await {
            Ok(result) => result,
            Err(e) => common::failure(DOCUMENTATION, "generate documentation", &e)
                .with("confluence_page_url", "")
                .with("local_doc_path", "")
                .with("api_docs", Value::Array(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_collaborators, stage_context};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context(dir: &std::path::Path) -> StageContext {
        stage_context(
            &dir.join("t.txt"),
            dir,
            &[
                (CONFLUENCE_FOLDER, json!({"folder_id": "1700000000", "parent_page_id": "7"})),
                (
                    IMPLEMENTATION,
                    json!({"files_created": [{"path": "src/a.c", "description": "A"}]}),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn test_no_files_skips_model() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        let ctx = stage_context(&dir.path().join("t.txt"), dir.path(), &[]);

        let result = DocumentationStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_failure());
        assert_eq!(result.error(), Some("No implementation files found"));
        assert_eq!(result.get_str("confluence_page_url"), "");
        assert_eq!(result.get_str("local_doc_path"), "");
        assert_eq!(result.get("api_docs"), Some(&json!([])));
        assert_eq!(fakes.model.call_count(), 0);
        assert!(fakes.documents.published().is_empty());
    }

    #[tokio::test]
    async fn test_writes_commits_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.source_control.add_file("src/a.c", "int a;");
        fakes.model.push_reply(
            r##"{"documentation": {"content": "# Guide\\n\\nBuild with `nmake`.", "title": "Guide", "summary": "How"}, "api_docs": [{"function": "a"}]}"##,
        );
        let ctx = context(dir.path());

        let result = DocumentationStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_success());
        assert_eq!(result.get("confluence_success"), Some(&json!(true)));
        assert_eq!(result.get_str("repo_doc_path"), REPO_DOC_PATH);
        assert_eq!(result.get_str("title"), "Guide");
        assert_eq!(result.get("api_docs"), Some(&json!([{"function": "a"}])));

        let local = std::fs::read_to_string(dir.path().join(DOCUMENTATION_FILE)).unwrap();
        assert_eq!(local, "# Guide\n\nBuild with `nmake`.");
        assert_eq!(fakes.source_control.file(REPO_DOC_PATH).as_deref(), Some(local.as_str()));

        let pages = fakes.documents.published();
        assert_eq!(pages[0].title, "1700000000 Unknown Project - Implementation Documentation");
        assert_eq!(pages[0].parent_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.documents.fail_with("quota");
        fakes.model.push_reply("not json at all");
        let ctx = context(dir.path());

        let result = DocumentationStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_success());
        assert_eq!(result.get("confluence_success"), Some(&json!(false)));
        assert!(dir.path().join(DOCUMENTATION_FILE).exists());
    }

    #[tokio::test]
    async fn test_model_error_fails_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.model.push_error("timeout");
        let ctx = context(dir.path());

        let result = DocumentationStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_failure());
        assert_eq!(result.get_str("local_doc_path"), "");
        assert!(result.get_str("message").starts_with("Failed to generate documentation"));
    }
}
