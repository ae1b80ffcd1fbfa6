//! Unit test generation for the implementation files.

use super::common::{self, file_records, files_context, knowledge_context, FileRecord};
use super::{Stage, IMPLEMENTATION, TESTS};
use crate::collaborators::{ChatMessage, Collaborators};
use crate::context::StageContext;
use crate::contracts::TestsResponse;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::normalizer;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a QA Engineer writing unit tests for Windows code that \
was converted from Linux.

Testing guidance:
{knowledge}

Return ONLY a JSON object of the form:
{\"test_files\": [{\"path\": \"tests/test_name.c\", \"content\": \"full test source\", \
\"description\": \"what is tested\"}], \"notes\": \"testing notes\"}";

/// Writes and commits tests for the files the implementation stage created.
#[derive(Debug, Clone)]
pub struct TestSuiteStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl TestSuiteStage {
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
        let scm = self.collaborators.source_control.as_ref();
        let code = files_context(scm, files).await;
        let (knowledge, _) = knowledge_context(
            self.collaborators.knowledge.as_ref(),
            "unit tests Windows API error handling",
            self.top_k,
        );
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT.replace("{knowledge}", &knowledge)),
            ChatMessage::user(format!(
                "Write unit tests for these implementation files:\n\n{code}"
            )),
        ];

        let raw = self.collaborators.model.invoke(&messages).await?;
        let response = normalizer::normalize_as::<TestsResponse>(&raw);

        let mut written = Vec::with_capacity(response.value.test_files.len());
        for file in &response.value.test_files {
            let full_path = scm.write_file(&file.path, &file.content).await?;
            written.push(FileRecord {
                path: file.path.clone(),
                description: file.description.clone(),
                full_path: full_path.display().to_string(),
            });
        }
        let paths: Vec<String> = written.iter().map(|f| f.path.clone()).collect();
        let commit = scm
            .commit_files(&paths, &format!("Add unit tests for {} files", files.len()))
            .await?;
        info!(
            run = %ctx.identity().workflow_id(),
            tests = written.len(),
            commit = %commit.commit_hash,
            "Committed tests"
        );

        Ok(StageResult::success(json!({
            "test_files": written,
            "coverage_report": "pending_execution",
            "test_results": "tests_generated",
            "testing_notes": response.value.notes,
            "fallback_used": response.is_fallback(),
        })))
    }
}

#[async_trait]
impl Stage for TestSuiteStage {
    fn name(&self) -> &str {
        TESTS
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let files = file_records(&ctx.prior(IMPLEMENTATION), "files_created");
        if files.is_empty() {
            info!("No implementation files, skipping test generation");
            return StageResult::new()
                .with("test_files", Value::Array(Vec::new()))
                .with("coverage_report", "")
                .with("test_results", "no_files_to_test");
        }
        match self.run(ctx, &files).await {
            Ok(result) => result,
            Err(e) => common::failure(TESTS, "generate tests", &e)
                .with("test_files", Value::Array(Vec::new()))
                .with("coverage_report", "")
                .with("test_results", format!("test_generation_failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_collaborators, stage_context};
    use pretty_assertions::assert_eq;

    fn implementation() -> Value {
        json!({"files_created": [
            {"path": "src/win/metrics.c", "description": "Metrics", "full_path": "/w/src/win/metrics.c"}
        ]})
    }

    #[tokio::test]
    async fn test_no_files_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        let ctx = stage_context(&dir.path().join("t.txt"), dir.path(), &[]);

        let result = TestSuiteStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_success());
        assert_eq!(result.get_str("test_results"), "no_files_to_test");
        assert_eq!(result.get_str("coverage_report"), "");
        assert_eq!(fakes.model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generates_tests_from_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.source_control.add_file("src/win/metrics.c", "int cpu_usage(void);");
        fakes.model.push_reply(
            r#"{"test_files": [{"path": "tests/test_metrics.c", "content": "void t(){}", "description": "cpu"}], "notes": "Unity"}"#,
        );
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[(IMPLEMENTATION, implementation())],
        );

        let result = TestSuiteStage::new(collaborators, 3).execute(&ctx).await;
        assert_eq!(result.get_str("test_results"), "tests_generated");
        assert_eq!(result.get_str("coverage_report"), "pending_execution");
        assert_eq!(result.get_str("testing_notes"), "Unity");
        assert_eq!(fakes.source_control.file("tests/test_metrics.c").as_deref(), Some("void t(){}"));
        assert!(fakes.model.prompts()[0][1].content.contains("int cpu_usage(void);"));
        assert_eq!(fakes.source_control.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_model_error_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.model.push_error("bad gateway");
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[(IMPLEMENTATION, implementation())],
        );

        let result = TestSuiteStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_failure());
        assert!(result.get_str("test_results").starts_with("test_generation_failed:"));
    }
}
