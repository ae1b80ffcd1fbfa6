//! Document store pages: the project folder and its child pages.

use super::common::{self, non_empty_str, ProjectInfo};
use super::{
    Stage, CONFLUENCE_FOLDER, DESIGN_CONFLUENCE, DESIGN_SPEC, REQUIREMENTS,
    REQUIREMENTS_CONFLUENCE, TRANSCRIPT,
};
use crate::collaborators::{Collaborators, PageRequest};
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Which page a [`PageStage`] publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKindStage {
    /// The top-level project folder.
    ProjectFolder,
    /// The requirements page under the folder.
    Requirements,
    /// The technical design page under the folder.
    Design,
}

impl PageKindStage {
    /// Context key of the stage.
    #[must_use]
    pub fn stage_name(self) -> &'static str {
        match self {
            Self::ProjectFolder => CONFLUENCE_FOLDER,
            Self::Requirements => REQUIREMENTS_CONFLUENCE,
            Self::Design => DESIGN_CONFLUENCE,
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::ProjectFolder => "create project folder",
            Self::Requirements => "publish requirements page",
            Self::Design => "publish design page",
        }
    }
}

/// Publishes one page to the document store.
#[derive(Debug, Clone)]
pub struct PageStage {
    kind: PageKindStage,
    collaborators: Collaborators,
}

impl PageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(kind: PageKindStage, collaborators: Collaborators) -> Self {
        Self {
            kind,
            collaborators,
        }
    }

    async fn publish_folder(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let info = ProjectInfo::from_context(ctx);
        let transcript = ctx.prior(TRANSCRIPT);
        let title = format!("[AI-Generated] {}", info.base_title);
        let body = format!(
            "## Project Overview\n\n\
             **Project:** {}\n\n\
             **Summary:** {}\n\n\
             **Created:** {}\n\n\
             This folder holds the requirements, technical design and implementation \
             documentation generated for this project.",
            info.project_name,
            non_empty_str(&transcript, "summary").unwrap_or("No summary available"),
            ctx.identity().display_time(),
        );

        let page = self
            .collaborators
            .documents
            .publish_page(&PageRequest::folder(&title, body))
            .await?;
        info!(title = %title, page_id = %page.id, "Created project folder");
        Ok(StageResult::success(json!({
            "folder_name": title,
            "folder_id": info.timestamp,
            "folder_url": page.url,
            "parent_page_id": page.id,
        })))
    }

    async fn publish_child(&self, ctx: &StageContext) -> Result<StageResult, CollaboratorError> {
        let info = ProjectInfo::from_context(ctx);
        let (source, suffix, label) = match self.kind {
            PageKindStage::Design => (DESIGN_SPEC, "Technical Design", "Technical design"),
            _ => (REQUIREMENTS, "Requirements", "Requirements"),
        };
        let document = ctx.prior(source);
        let content = non_empty_str(&document, "content")
            .map_or_else(|| format!("{label} content not available"), str::to_string);
        let title = format!("{} - {suffix}", info.base_title);
        let body = format!(
            "> {label} generated for **{}** on {}.\n\n{content}",
            info.project_name,
            ctx.identity().display_time(),
        );
        let folder = ctx.prior(CONFLUENCE_FOLDER);
        let request = PageRequest::document(&title, body)
            .with_parent(non_empty_str(&folder, "parent_page_id"));

        let page = self.collaborators.documents.publish_page(&request).await?;
        info!(title = %title, page_id = %page.id, "Published page");
        Ok(StageResult::success(json!({
            "page_id": page.id,
            "page_url": page.url,
            "title": title,
        })))
    }
}

#[async_trait]
impl Stage for PageStage {
    fn name(&self) -> &str {
        self.kind.stage_name()
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let outcome = match self.kind {
            PageKindStage::ProjectFolder => self.publish_folder(ctx).await,
            PageKindStage::Requirements | PageKindStage::Design => self.publish_child(ctx).await,
        };
        outcome.unwrap_or_else(|e| common::failure(self.kind.stage_name(), self.kind.action(), &e))
    }
}
