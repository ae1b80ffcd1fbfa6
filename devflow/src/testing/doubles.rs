//! In-memory collaborator doubles.
//!
//! Each double records what it was asked to do so tests can assert on the
//! calls, and can be switched into a failing mode.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::collaborators::{
    BranchInfo, ChangeRequest, ChangeRequestInfo, ChatMessage, CloneInfo, CommitInfo,
    DocumentStore, LanguageModel, NotificationMessage, NotificationReceipt, Notifier, PageRef,
    PageRequest, SourceControl,
};
use crate::errors::CollaboratorError;

/// Root that [`RecordingSourceControl`] reports for written files.
pub const FAKE_CHECKOUT: &str = "/workspace/reference_repo";

/// A language model that replays queued replies.
///
/// An empty queue answers with an error, so an unexpected call shows up as a
/// degraded stage rather than a hang.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    /// Creates a model with no replies queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    /// Queues a server error.
    pub fn push_error(&self, body: impl Into<String>) {
        self.replies.lock().push_back(Err(body.into()));
    }

    /// Returns the number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns the messages of every invocation.
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
        self.prompts.lock().push(messages.to_vec());
        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(body)) => Err(CollaboratorError::Api { status: 503, body }),
            None => Err(CollaboratorError::Unavailable("scripted reply".to_string())),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Debug)]
struct ScmState {
    repository_url: Option<String>,
    files: IndexMap<String, String>,
    commits: Vec<(Vec<String>, String)>,
    change_requests: Vec<ChangeRequest>,
    branch: Option<String>,
}

/// Source control over an in-memory file map.
#[derive(Debug)]
pub struct RecordingSourceControl {
    state: Mutex<ScmState>,
    default_branch: String,
}

impl Default for RecordingSourceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSourceControl {
    /// Creates a double for `https://git.test/acme/metrics` on `main`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScmState {
                repository_url: Some("https://git.test/acme/metrics".to_string()),
                files: IndexMap::new(),
                commits: Vec::new(),
                change_requests: Vec::new(),
                branch: None,
            }),
            default_branch: "main".to_string(),
        }
    }

    /// Overrides the configured repository URL.
    pub fn set_repository_url(&self, url: Option<&str>) {
        self.state.lock().repository_url = url.map(str::to_string);
    }

    /// Seeds a file in the working copy.
    pub fn add_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), content.to_string());
    }

    /// Returns a file's content.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<String> {
        self.state.lock().files.get(path).cloned()
    }

    /// Returns `(paths, message)` for every commit.
    #[must_use]
    pub fn commits(&self) -> Vec<(Vec<String>, String)> {
        self.state.lock().commits.clone()
    }

    /// Returns every change request opened.
    #[must_use]
    pub fn change_requests(&self) -> Vec<ChangeRequest> {
        self.state.lock().change_requests.clone()
    }
}

#[async_trait]
impl SourceControl for RecordingSourceControl {
    fn repository_url(&self) -> Option<String> {
        self.state.lock().repository_url.clone()
    }

    fn default_branch(&self) -> String {
        self.default_branch.clone()
    }

    async fn prepare_working_copy(&self, repo_url: &str) -> Result<CloneInfo, CollaboratorError> {
        Ok(CloneInfo {
            repo_url: repo_url.to_string(),
            local_path: FAKE_CHECKOUT.to_string(),
            current_branch: self.default_branch.clone(),
            latest_commit: "0000000".to_string(),
            status: "cloned_successfully".to_string(),
        })
    }

    async fn create_branch(&self, feature: &str) -> Result<BranchInfo, CollaboratorError> {
        let now = chrono::Local::now();
        let name = format!(
            "ai_branch/{feature}-{}_{}",
            now.format("%Y%m%d"),
            now.timestamp()
        );
        self.state.lock().branch = Some(name.clone());
        Ok(BranchInfo {
            branch_name: name,
            base_branch: self.default_branch.clone(),
            created_from: "0000000".to_string(),
            status: "created_successfully".to_string(),
            pushed_to_remote: true,
            push_error: None,
        })
    }

    async fn list_files(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.state.lock().files.keys().cloned().collect())
    }

    async fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf, CollaboratorError> {
        self.add_file(relative, content);
        Ok(PathBuf::from(FAKE_CHECKOUT).join(relative))
    }

    async fn read_file(&self, relative: &str) -> Result<String, CollaboratorError> {
        self.file(relative).ok_or_else(|| {
            CollaboratorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                relative.to_string(),
            ))
        })
    }

    async fn commit_files(
        &self,
        paths: &[String],
        message: &str,
    ) -> Result<CommitInfo, CollaboratorError> {
        let mut state = self.state.lock();
        state.commits.push((paths.to_vec(), message.to_string()));
        Ok(CommitInfo {
            commit_hash: format!("{:07x}", state.commits.len()),
            commit_message: message.to_string(),
            files_committed: paths.to_vec(),
            pushed_to_remote: true,
            push_error: None,
        })
    }

    async fn open_change_request(
        &self,
        request: &ChangeRequest,
    ) -> Result<ChangeRequestInfo, CollaboratorError> {
        let mut state = self.state.lock();
        state.change_requests.push(request.clone());
        let number = state.change_requests.len() as u64;
        let base = state.repository_url.clone().unwrap_or_default();
        Ok(ChangeRequestInfo {
            number,
            url: format!("{base}/pull/{number}"),
        })
    }
}

/// A document store that records published pages.
#[derive(Debug, Default)]
pub struct RecordingDocumentStore {
    published: Mutex<Vec<PageRequest>>,
    failure: Mutex<Option<String>>,
}

impl RecordingDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later publish fail with an API error.
    pub fn fail_with(&self, body: &str) {
        *self.failure.lock() = Some(body.to_string());
    }

    /// Returns the successfully published requests.
    #[must_use]
    pub fn published(&self) -> Vec<PageRequest> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl DocumentStore for RecordingDocumentStore {
    async fn publish_page(&self, request: &PageRequest) -> Result<PageRef, CollaboratorError> {
        if let Some(body) = self.failure.lock().clone() {
            return Err(CollaboratorError::Api { status: 400, body });
        }
        let mut published = self.published.lock();
        published.push(request.clone());
        let n = published.len();
        Ok(PageRef {
            id: format!("page-{n}"),
            url: format!("https://wiki.test/pages/{n}"),
            title: request.title.clone(),
        })
    }
}

/// A notifier that records posted messages.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationMessage>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later post fail with an API error.
    pub fn fail_with(&self, body: &str) {
        *self.failure.lock() = Some(body.to_string());
    }

    /// Returns the messages posted.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(
        &self,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, CollaboratorError> {
        if let Some(body) = self.failure.lock().clone() {
            return Err(CollaboratorError::Api { status: 200, body });
        }
        self.sent.lock().push(message.clone());
        Ok(NotificationReceipt {
            channel: "#test".to_string(),
            timestamp: Some("1700000000.000100".to_string()),
        })
    }
}
