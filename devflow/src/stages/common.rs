//! Helpers shared by the workflow stages.

use super::{CONFLUENCE_FOLDER, TRANSCRIPT};
use crate::collaborators::{KnowledgeBase, SourceControl};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

/// Title and timestamp shared by every page of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Project name from the transcript.
    pub project_name: String,
    /// Run timestamp used in page titles.
    pub timestamp: String,
    /// `{timestamp} {project_name}`.
    pub base_title: String,
}

impl ProjectInfo {
    /// Derives the project info from earlier results.
    ///
    /// The timestamp comes from the folder stage when it ran, so child pages
    /// carry the same prefix as their folder.
    #[must_use]
    pub fn from_context(ctx: &StageContext) -> Self {
        let transcript = ctx.prior(TRANSCRIPT);
        let project_name = non_empty_str(&transcript, "project_name")
            .unwrap_or("Unknown Project")
            .to_string();
        let folder = ctx.prior(CONFLUENCE_FOLDER);
        let timestamp = match folder.get("folder_id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => ctx.identity().unix_timestamp().to_string(),
        };
        Self {
            base_title: format!("{timestamp} {project_name}"),
            project_name,
            timestamp,
        }
    }
}

/// A file entry recorded by the implementation and tests stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the working copy.
    pub path: String,
    /// What the file contains.
    #[serde(default)]
    pub description: String,
    /// Absolute location on disk.
    #[serde(default)]
    pub full_path: String,
}

/// Reads a list of file records from a stage result field.
#[must_use]
pub fn file_records(result: &Value, key: &str) -> Vec<FileRecord> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Returns a string field when it is present and not blank.
#[must_use]
pub fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Formats knowledge hits as a bullet list.
///
/// Returns the text and the number of hits used.
#[must_use]
pub fn knowledge_context(knowledge: &dyn KnowledgeBase, query: &str, top_k: usize) -> (String, usize) {
    let hits = knowledge.query(query, top_k);
    let text = hits
        .iter()
        .map(|hit| format!("- {}", hit.content))
        .collect::<Vec<_>>()
        .join("\n");
    (text, hits.len())
}

/// Renders `path: description` bullets.
#[must_use]
pub fn file_bullets(files: &[FileRecord]) -> String {
    files
        .iter()
        .map(|f| format!("- `{}`: {}", f.path, f.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads each file from the working copy as prompt context.
///
/// Files that cannot be read are skipped with a warning.
pub async fn files_context(source_control: &dyn SourceControl, files: &[FileRecord]) -> String {
    let mut context = String::new();
    for file in files {
        match source_control.read_file(&file.path).await {
            Ok(content) => context.push_str(&format!(
                "File: {}\nDescription: {}\nContent:\n{}\n\n",
                file.path, file.description, content
            )),
            Err(e) => warn!(path = %file.path, error = %e, "Could not read generated file"),
        }
    }
    context
}

/// Writes an artifact into the run's output directory.
pub async fn write_output(
    ctx: &StageContext,
    name: &str,
    content: &str,
) -> Result<PathBuf, CollaboratorError> {
    tokio::fs::create_dir_all(ctx.output_dir()).await?;
    let path = ctx.output_dir().join(name);
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Converts a collaborator error into a failed stage result.
#[must_use]
pub fn failure(stage: &str, action: &str, error: &CollaboratorError) -> StageResult {
    warn!(stage = %stage, error = %error, code = error.code(), "Stage degraded");
    StageResult::failure(error.to_string(), format!("Failed to {action}: {error}"))
        .with("error_code", error.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryKnowledgeBase;
    use crate::context::{PipelineContext, RunIdentity};
    use serde_json::json;
    use std::sync::Arc;

    fn stage_ctx(results: &[(&str, Value)]) -> StageContext {
        let ctx = Arc::new(PipelineContext::new(RunIdentity::new(), "t.txt", "out"));
        for (stage, value) in results {
            ctx.record(stage, StageResult::from_value(value.clone())).unwrap();
        }
        StageContext::new(ctx, "test")
    }

    #[test]
    fn test_project_info_uses_folder_timestamp() {
        let ctx = stage_ctx(&[
            (TRANSCRIPT, json!({"project_name": "Port"})),
            (CONFLUENCE_FOLDER, json!({"folder_id": "1700000000"})),
        ]);
        let info = ProjectInfo::from_context(&ctx);
        assert_eq!(info.base_title, "1700000000 Port");
    }

    #[test]
    fn test_project_info_defaults() {
        let ctx = stage_ctx(&[]);
        let info = ProjectInfo::from_context(&ctx);
        assert_eq!(info.project_name, "Unknown Project");
        assert_eq!(info.timestamp, ctx.identity().unix_timestamp().to_string());
    }

    #[test]
    fn test_file_records_skip_malformed() {
        let value = json!({"files_created": [
            {"path": "a.c", "description": "A", "full_path": "/w/a.c"},
            {"description": "no path"},
        ]});
        let records = file_records(&value, "files_created");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "a.c");
        assert!(file_records(&value, "missing").is_empty());
    }

    #[test]
    fn test_knowledge_context() {
        let kb = InMemoryKnowledgeBase::new().with_entry("open maps to CreateFile");
        let (text, used) = knowledge_context(&kb, "open", 3);
        assert_eq!(text, "- open maps to CreateFile");
        assert_eq!(used, 1);
    }

    #[test]
    fn test_failure_result() {
        let result = failure("tests", "generate tests", &CollaboratorError::Unavailable("x".into()));
        assert!(result.is_failure());
        assert_eq!(result.get_str("error_code"), "unavailable");
        assert_eq!(result.get_str("message"), "Failed to generate tests: x is not configured");
    }
}
