//! Technical design generation.

use super::common::{self, knowledge_context, non_empty_str};
use super::{Stage, DESIGN_SPEC, REQUIREMENTS, TRANSCRIPT};
use crate::collaborators::{ChatMessage, Collaborators};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// File name of the design document in the output directory.
pub const DESIGN_FILE: &str = "design_spec.md";

const SYSTEM_PROMPT: &str = "You are a Senior Software Architect creating a technical design \
specification. This is NOT a requirements document.

Cover: system architecture overview, technical API design, a detailed implementation plan, \
the Linux to Windows conversion strategy with code examples, file and directory structure, \
testing and validation strategy, performance and security considerations, and risks.

Use this conversion knowledge from our internal knowledge base:
{knowledge}

Generate the document in Markdown format with function signatures and specific technical \
details. Focus on HOW to implement, not WHAT to implement.";

/// Writes `design_spec.md` from the requirements document.
#[derive(Debug, Clone)]
pub struct DesignStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl DesignStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, top_k: usize) -> Self {
        Self {
            collaborators,
            top_k,
        }
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let requirements = ctx.prior(REQUIREMENTS);
        let project_name = non_empty_str(&requirements, "project_name")
            .unwrap_or("Unknown")
            .to_string();
        let requirements_text = non_empty_str(&requirements, "content").unwrap_or_default();
        let summary = ctx.prior(TRANSCRIPT);
        let summary = non_empty_str(&summary, "summary").unwrap_or_default();

        let (knowledge, used) = knowledge_context(
            self.collaborators.knowledge.as_ref(),
            &format!("Linux to Windows conversion {summary}"),
            self.top_k,
        );
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT.replace("{knowledge}", &knowledge)),
            ChatMessage::user(format!(
                "Create a TECHNICAL DESIGN SPECIFICATION (not requirements) for this project:\n\n\
                 Project: {project_name}\n\n\
                 Based on these requirements, design the technical implementation:\n\
                 {requirements_text}"
            )),
        ];

        let (content, knowledge_used, fallback) =
            match self.collaborators.model.invoke(&messages).await {
                Ok(content) if !content.trim().is_empty() => (content, used, false),
                Ok(_) => {
                    warn!("Model returned an empty design, using fallback");
                    (fallback_document(&project_name), 0, true)
                }
                Err(e) => {
                    warn!(error = %e, "Design generation failed, using fallback");
                    (fallback_document(&project_name), 0, true)
                }
            };

        let path = common::write_output(ctx, DESIGN_FILE, &content).await?;
        info!(path = %path.display(), knowledge_used, "Wrote design specification");
        Ok(StageResult::success(json!({
            "document_path": path.display().to_string(),
            "content": content,
            "conversion_knowledge_used": knowledge_used,
            "generated_at": chrono::Local::now().to_rfc3339(),
            "fallback": fallback,
        })))
    }
}

fn fallback_document(project_name: &str) -> String {
    let project = if project_name == "Unknown" {
        "Linux to Windows Conversion"
    } else {
        project_name
    };
    format!(
        "# Technical Design Specification

## Project: {project}

## Architecture Overview
Convert Linux system calls to equivalent Windows API calls while maintaining functionality.

## Implementation Strategy
1. Analyze existing Linux code
2. Identify system calls requiring conversion
3. Map to equivalent Windows APIs
4. Implement conversion with error handling
5. Create unit tests

## File Structure
- src/windows/ - Windows-specific implementations
- tests/ - Unit tests
- docs/ - Documentation

## Testing Strategy
- Unit tests for each converted function
- Integration tests for complete workflows
- Performance comparison with Linux version
"
    )
}

#[async_trait]
impl Stage for DesignStage {
    fn name(&self) -> &str {
        DESIGN_SPEC
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        match self.run(ctx).await {
            Ok(result) => result,
            Err(e) => common::failure(DESIGN_SPEC, "write design specification", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_collaborators, stage_context};

    #[tokio::test]
    async fn test_design_records_knowledge_used() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.model.push_reply("# Design\n\nUse CreateFile.");
        let ctx = stage_context(
            &dir.path().join("t.txt"),
            dir.path(),
            &[(REQUIREMENTS, json!({"project_name": "Port", "content": "# Req"}))],
        );

        let result = DesignStage::new(collaborators, 3).execute(&ctx).await;
        assert!(result.is_success());
        assert_eq!(result.get("conversion_knowledge_used"), Some(&json!(3)));
        assert!(dir.path().join(DESIGN_FILE).exists());
        assert!(fakes.model.prompts()[0][1].content.contains("# Req"));
    }

    #[tokio::test]
    async fn test_fallback_reports_zero_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let (collaborators, fakes) = fake_collaborators();
        fakes.model.push_error("down");
        let ctx = stage_context(&dir.path().join("t.txt"), dir.path(), &[]);

        let result = DesignStage::new(collaborators, 3).execute(&ctx).await;
        assert_eq!(result.get("conversion_knowledge_used"), Some(&json!(0)));
        assert!(result.get_str("content").contains("## Project: Linux to Windows Conversion"));
    }
}
