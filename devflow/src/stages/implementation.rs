//! Code generation into the working copy.

use super::common::{self, knowledge_context, non_empty_str, FileRecord};
use super::{Stage, DESIGN_SPEC, IMPLEMENTATION, REPO_INFO};
use crate::collaborators::{ChatMessage, Collaborators};
use crate::context::StageContext;
use crate::contracts::ImplementationResponse;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::normalizer;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Repository files listed in the prompt.
const MAX_LISTED_FILES: usize = 20;

const SYSTEM_PROMPT: &str = "You are a Senior Software Engineer implementing Linux to \
Windows code conversions.

Use this conversion knowledge:
{knowledge}

Return ONLY a JSON object of the form:
{\"files\": [{\"path\": \"relative/path\", \"content\": \"full file content\", \
\"description\": \"what the file does\"}], \"notes\": \"implementation notes\"}

Paths are relative to the repository root. Do not wrap the JSON in markdown.";

/// Generates source files from the design and commits them.
#[derive(Debug, Clone)]
pub struct ImplementationStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl ImplementationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, top_k: usize) -> Self {
        Self {
            collaborators,
            top_k,
        }
    }

    fn user_prompt(design: &str, repo_files: &[String]) -> String {
        let listed = repo_files
            .iter()
            .take(MAX_LISTED_FILES)
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Implement the following technical design:\n\n{design}\n\n\
             Existing repository files:\n{listed}\n\n\
             Generate the Windows implementation files."
        )
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let design = ctx.prior(DESIGN_SPEC);
        let design = non_empty_str(&design, "content").unwrap_or("No design available");
        let repo_files: Vec<String> = ctx
            .prior(REPO_INFO)
            .get("repo_files")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let (knowledge, _) = knowledge_context(
            self.collaborators.knowledge.as_ref(),
            &format!("Linux to Windows implementation {design}"),
            self.top_k,
        );
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT.replace("{knowledge}", &knowledge)),
            ChatMessage::user(Self::user_prompt(design, &repo_files)),
        ];

        let raw = self.collaborators.model.invoke(&messages).await?;
        let response = normalizer::normalize_as::<ImplementationResponse>(&raw);
        if response.is_fallback() {
            warn!("Implementation response unusable, writing fallback files");
        }

        let scm = &self.collaborators.source_control;
        let mut created = Vec::with_capacity(response.value.files.len());
        for file in &response.value.files {
            let full_path = scm.write_file(&file.path, &file.content).await?;
            created.push(FileRecord {
                path: file.path.clone(),
                description: file.description.clone(),
                full_path: full_path.display().to_string(),
            });
        }

        let paths: Vec<String> = created.iter().map(|f| f.path.clone()).collect();
        let message = format!(
            "AI-generated Windows implementation\n\nFiles created:\n{}",
            created
                .iter()
                .map(|f| format!("- {}: {}", f.path, f.description))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let commit = scm.commit_files(&paths, &message).await?;
        info!(files = created.len(), commit = %commit.commit_hash, "Committed implementation");

        Ok(StageResult::success(json!({
            "files_created": created,
            "files_modified": [],
            "implementation_notes": response.value.notes,
            "commit_created": true,
            "commit_info": commit,
            "fallback_used": response.is_fallback(),
        })))
    }
}

#[async_trait]
impl Stage for ImplementationStage {
    fn name(&self) -> &str {
        IMPLEMENTATION
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        match self.run(ctx).await {
            Ok(result) => result,
            Err(e) => common::failure(IMPLEMENTATION, "generate implementation", &e)
                .with("files_created", Value::Array(Vec::new()))
                .with("files_modified", Value::Array(Vec::new()))
                .with("implementation_notes", format!("Implementation failed: {e}"))
                .with("commit_created", false),
        }
    }
}
