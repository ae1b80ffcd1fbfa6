//! Source control collaborator contract.

use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of preparing the working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneInfo {
    /// Repository URL without credentials.
    pub repo_url: String,
    /// Local checkout location.
    pub local_path: String,
    /// Branch checked out after cloning.
    pub current_branch: String,
    /// Head commit after cloning.
    pub latest_commit: String,
    /// Outcome label.
    pub status: String,
}

/// Result of creating the feature branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// New branch name.
    pub branch_name: String,
    /// Branch pull requests will target.
    pub base_branch: String,
    /// Commit the branch starts from.
    pub created_from: String,
    /// Outcome label.
    pub status: String,
    /// Whether the branch reached the remote.
    pub pushed_to_remote: bool,
    /// Push failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_error: Option<String>,
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// New commit id.
    pub commit_hash: String,
    /// Commit message.
    pub commit_message: String,
    /// Paths included in the commit.
    pub files_committed: Vec<String>,
    /// Whether the commit reached the remote.
    pub pushed_to_remote: bool,
    /// Push failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_error: Option<String>,
}

/// A request to merge the feature branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
}

/// An opened change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestInfo {
    /// Number assigned by the host.
    pub number: u64,
    /// Browser URL.
    pub url: String,
}

/// Working copy and change request operations.
///
/// Operations after `prepare_working_copy` act on the prepared checkout.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Returns false when no repository is configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Repository URL configured for this run, if any.
    fn repository_url(&self) -> Option<String>;

    /// Branch pull requests target.
    fn default_branch(&self) -> String;

    /// Clones `repo_url`, replacing any existing checkout.
    async fn prepare_working_copy(&self, repo_url: &str) -> Result<CloneInfo, CollaboratorError>;

    /// Creates and checks out the feature branch, then tries to push it.
    async fn create_branch(&self, feature: &str) -> Result<BranchInfo, CollaboratorError>;

    /// Lists tracked files, relative to the checkout root.
    async fn list_files(&self) -> Result<Vec<String>, CollaboratorError>;

    /// Writes a file into the checkout and returns its full path.
    async fn write_file(&self, relative: &str, content: &str)
        -> Result<PathBuf, CollaboratorError>;

    /// Reads a file from the checkout.
    async fn read_file(&self, relative: &str) -> Result<String, CollaboratorError>;

    /// Stages and commits `paths`, then tries to push.
    async fn commit_files(
        &self,
        paths: &[String],
        message: &str,
    ) -> Result<CommitInfo, CollaboratorError>;

    /// Opens a change request on the hosting service.
    async fn open_change_request(
        &self,
        request: &ChangeRequest,
    ) -> Result<ChangeRequestInfo, CollaboratorError>;
}

/// Stand-in used when no repository URL is configured.
#[derive(Debug, Clone)]
pub struct UnavailableSourceControl {
    default_branch: String,
}

impl UnavailableSourceControl {
    /// Creates the stand-in.
    #[must_use]
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
        }
    }

    fn unavailable<T>() -> Result<T, CollaboratorError> {
        Err(CollaboratorError::Unavailable("source control".to_string()))
    }
}

#[async_trait]
impl SourceControl for UnavailableSourceControl {
    fn is_available(&self) -> bool {
        false
    }

    fn repository_url(&self) -> Option<String> {
        None
    }

    fn default_branch(&self) -> String {
        self.default_branch.clone()
    }

    async fn prepare_working_copy(&self, _repo_url: &str) -> Result<CloneInfo, CollaboratorError> {
        Self::unavailable()
    }

    async fn create_branch(&self, _feature: &str) -> Result<BranchInfo, CollaboratorError> {
        Self::unavailable()
    }

    async fn list_files(&self) -> Result<Vec<String>, CollaboratorError> {
        Self::unavailable()
    }

    async fn write_file(
        &self,
        _relative: &str,
        _content: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        Self::unavailable()
    }

    async fn read_file(&self, _relative: &str) -> Result<String, CollaboratorError> {
        Self::unavailable()
    }

    async fn commit_files(
        &self,
        _paths: &[String],
        _message: &str,
    ) -> Result<CommitInfo, CollaboratorError> {
        Self::unavailable()
    }

    async fn open_change_request(
        &self,
        _request: &ChangeRequest,
    ) -> Result<ChangeRequestInfo, CollaboratorError> {
        Self::unavailable()
    }
}
