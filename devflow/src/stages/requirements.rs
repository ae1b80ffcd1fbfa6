//! Requirements document generation.

use super::common::{self, knowledge_context, non_empty_str};
use super::{Stage, REQUIREMENTS, TRANSCRIPT};
use crate::collaborators::{ChatMessage, Collaborators};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

/// File name of the requirements document in the output directory.
pub const REQUIREMENTS_FILE: &str = "requirements.md";

const SYSTEM_PROMPT: &str = "You are a Product Manager AI creating a requirements document \
based on a meeting transcript.

Use this knowledge base context for requirements best practices:
{knowledge}

Generate a comprehensive requirements document in Markdown format that includes:

1. Project Overview
2. Business Requirements
3. Functional Requirements
4. Non-Functional Requirements
5. Acceptance Criteria
6. Success Metrics

Focus on converting Linux system code to Windows equivalents. Be specific and actionable.";

/// Writes `requirements.md` from the transcript details.
#[derive(Debug, Clone)]
pub struct RequirementsStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl RequirementsStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, top_k: usize) -> Self {
        Self {
            collaborators,
            top_k,
        }
    }

    fn user_prompt(transcript: &Value) -> String {
        let list = |key: &str| transcript.get(key).cloned().unwrap_or_else(|| json!([]));
        format!(
            "Based on this meeting transcript analysis, create a requirements document:\n\n\
             Project: {}\nSummary: {}\nKey Requirements: {}\nTechnical Details: {}\n\
             Source Platform: {}\nTarget Platform: {}\n\n\
             Generate a professional requirements document in Markdown format.",
            non_empty_str(transcript, "project_name").unwrap_or("Unknown"),
            non_empty_str(transcript, "summary").unwrap_or_default(),
            list("key_requirements"),
            list("technical_details"),
            non_empty_str(transcript, "source_platform").unwrap_or("Linux"),
            non_empty_str(transcript, "target_platform").unwrap_or("Windows"),
        )
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let transcript = ctx.prior(TRANSCRIPT);
        let project_name = non_empty_str(&transcript, "project_name")
            .unwrap_or("Unknown")
            .to_string();
        let (knowledge, _) = knowledge_context(
            self.collaborators.knowledge.as_ref(),
            "requirements document business functional non-functional",
            self.top_k,
        );
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT.replace("{knowledge}", &knowledge)),
            ChatMessage::user(Self::user_prompt(&transcript)),
        ];

        let (content, fallback) = match self.collaborators.model.invoke(&messages).await {
            Ok(content) if !content.trim().is_empty() => (content, false),
            Ok(_) => {
                warn!("Model returned an empty requirements document, using fallback");
                (fallback_document(&project_name), true)
            }
            Err(e) => {
                warn!(error = %e, "Requirements generation failed, using fallback");
                (fallback_document(&project_name), true)
            }
        };

        let path = common::write_output(ctx, REQUIREMENTS_FILE, &content).await?;
        info!(path = %path.display(), fallback, "Wrote requirements document");
        Ok(StageResult::success(json!({
            "document_path": path.display().to_string(),
            "content": content,
            "project_name": project_name,
            "generated_at": chrono::Local::now().to_rfc3339(),
            "fallback": fallback,
        })))
    }
}

/// Requirements used when the model cannot produce them.
fn fallback_document(project_name: &str) -> String {
    let title = if project_name == "Unknown" {
        "Linux to Windows Conversion"
    } else {
        project_name
    };
    format!(
        "# Requirements Document: {title}

## Project Overview
Convert Linux system code to Windows API equivalents.

## Business Requirements
- Port existing Linux functionality to Windows platform
- Maintain equivalent functionality and performance
- Ensure code compatibility with Windows development standards

## Functional Requirements
- Convert Linux system calls to Windows API calls
- Implement equivalent error handling
- Maintain same input/output behavior

## Acceptance Criteria
- Code compiles successfully on Windows
- Functionality matches Linux equivalent
- Unit tests pass
"
    )
}

#[async_trait]
impl Stage for RequirementsStage {
    fn name(&self) -> &str {
        REQUIREMENTS
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        match self.run(ctx).await {
            Ok(result) => result,
            Err(e) => common::failure(REQUIREMENTS, "write requirements document", &e),
        }
    }
}
