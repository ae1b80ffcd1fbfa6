//! Transcript analysis.

use super::common::{self, knowledge_context};
use super::{Stage, TRANSCRIPT};
use crate::collaborators::{ChatMessage, Collaborators};
use crate::context::StageContext;
use crate::contracts::{ResponseKind, TranscriptDetails};
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::normalizer;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Reads the transcript and extracts project details with the model.
///
/// When the model cannot be reached the stage still succeeds with a basic
/// extraction, so the rest of the workflow has a project name to work with.
#[derive(Debug, Clone)]
pub struct TranscriptStage {
    collaborators: Collaborators,
    top_k: usize,
}

impl TranscriptStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(collaborators: Collaborators, top_k: usize) -> Self {
        Self {
            collaborators,
            top_k,
        }
    }

    fn prompt(knowledge: &str) -> String {
        format!(
            "You are an AI assistant that analyzes meeting transcripts for software \
             development projects.\n\n\
             Use this knowledge base context to better understand project patterns:\n{knowledge}\n\n\
             Extract the following information from the transcript and return it as JSON:\n\
             1. participants: List of people mentioned in the meeting\n\
             2. project_name: Name or title of the project/feature\n\
             3. key_requirements: Main functional requirements discussed\n\
             4. technical_details: Technical implementation details mentioned\n\
             5. repository_url: Any repository URLs mentioned\n\
             6. target_platform: What platform this is for\n\
             7. source_platform: What platform the code is converted from\n\
             8. deadline_info: Any deadlines or timeline information\n\
             9. summary: Brief summary of what needs to be built\n\n\
             Return only valid JSON without any markdown formatting."
        )
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let content = tokio::fs::read_to_string(ctx.transcript_path()).await?;
        let (knowledge, used) = knowledge_context(
            self.collaborators.knowledge.as_ref(),
            "meeting transcript analysis project requirements",
            self.top_k,
        );
        let messages = [
            ChatMessage::system(Self::prompt(&knowledge)),
            ChatMessage::user(format!("Please analyze this meeting transcript:\n\n{content}")),
        ];

        let (details, extraction) = match self.collaborators.model.invoke(&messages).await {
            Ok(raw) => {
                let parsed = normalizer::normalize(&raw, ResponseKind::Generic);
                (TranscriptDetails::from_response(&parsed), "model")
            }
            Err(e) => {
                warn!(error = %e, "Transcript analysis failed, using basic extraction");
                (TranscriptDetails::basic_extraction(), "basic")
            }
        };
        info!(project = %details.project_name, knowledge_used = used, "Parsed transcript");

        let mut result = StageResult::from_value(serde_json::to_value(&details).map_err(
            |e| CollaboratorError::Decode(e.to_string()),
        )?);
        result = result
            .with("raw_content", content)
            .with("extraction", extraction)
            .with("knowledge_entries_used", Value::from(used));
        Ok(result)
    }
}

#[async_trait]
impl Stage for TranscriptStage {
    fn name(&self) -> &str {
        TRANSCRIPT
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        match self.run(ctx).await {
            Ok(result) => result,
            Err(e) => common::failure(TRANSCRIPT, "read transcript", &e),
        }
    }
}
