//! Git working copy driven through the `git` command, plus the GitHub
//! pull request API.

use super::source_control::{
    BranchInfo, ChangeRequest, ChangeRequestInfo, CloneInfo, CommitInfo, SourceControl,
};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Name of the checkout directory inside the work directory.
pub const CHECKOUT_DIR: &str = "reference_repo";

const COMMIT_NAME: &str = "devflow";
const COMMIT_EMAIL: &str = "devflow@users.noreply.github.com";

/// Settings for [`GitSourceControl`].
#[derive(Debug, Clone, Default)]
pub struct GitConfig {
    /// Directory holding the checkout.
    pub work_directory: PathBuf,
    /// Branch pull requests target.
    pub default_branch: String,
    /// Configured repository URL.
    pub repo_url: Option<String>,
    /// Access token for cloning, pushing and the API.
    pub token: Option<String>,
    /// API base override. Derived from the repository host when absent.
    pub api_base: Option<String>,
}

/// A repository hosted on a GitHub-compatible service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Host name.
    pub host: String,
    /// Owner or organisation.
    pub owner: String,
    /// Repository name without `.git`.
    pub name: String,
}

impl RepoCoordinates {
    /// Parses an `https://host/owner/repo[.git]` URL.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let re = PATTERN
            .get_or_init(|| Regex::new(r"^https://([^/]+)/([^/]+)/([^/]+?)(?:\.git)?/?$").ok())
            .as_ref()?;
        let caps = re.captures(url.trim())?;
        Some(Self {
            host: caps[1].rsplit('@').next().unwrap_or(&caps[1]).to_string(),
            owner: caps[2].to_string(),
            name: caps[3].to_string(),
        })
    }

    /// REST API base for the host.
    #[must_use]
    pub fn api_base(&self) -> String {
        if self.host.eq_ignore_ascii_case("github.com") {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", self.host)
        }
    }
}

/// Embeds `token` in an https URL. Other URLs are returned unchanged.
#[must_use]
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (url.strip_prefix("https://"), token) {
        (Some(rest), Some(token)) if !token.is_empty() => format!("https://{token}@{rest}"),
        _ => url.to_string(),
    }
}

/// Checks that a path stays inside the checkout.
fn checked_relative(relative: &str) -> Result<&Path, CollaboratorError> {
    let path = Path::new(relative);
    let escapes = relative.trim().is_empty()
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(CollaboratorError::Rejected(format!(
            "path '{relative}' is outside the working copy"
        )));
    }
    Ok(path)
}

/// [`SourceControl`] backed by the `git` binary and the GitHub REST API.
#[derive(Debug)]
pub struct GitSourceControl {
    config: GitConfig,
    http: reqwest::Client,
    checkout: Mutex<Option<PathBuf>>,
    branch: Mutex<Option<String>>,
}

impl GitSourceControl {
    /// Creates the adapter.
    #[must_use]
    pub fn new(config: GitConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            checkout: Mutex::new(None),
            branch: Mutex::new(None),
        }
    }

    /// Returns the prepared checkout.
    fn checkout(&self) -> Result<PathBuf, CollaboratorError> {
        self.checkout.lock().clone().ok_or_else(|| {
            CollaboratorError::Rejected("working copy has not been prepared".to_string())
        })
    }

    fn redact(&self, text: &str) -> String {
        match self.config.token.as_deref() {
            Some(token) if !token.is_empty() => text.replace(token, "***"),
            _ => text.to_string(),
        }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, CollaboratorError> {
        let command = self.redact(&format!("git {}", args.join(" ")));
        debug!(command = %command, "Running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(CollaboratorError::Command {
                command,
                stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
            })
        }
    }

    /// Pushes `branch`, returning the failure text instead of an error.
    async fn push(&self, dir: &Path, branch: &str) -> Option<String> {
        let refspec = format!("{branch}:{branch}");
        match self.git(dir, &["push", "origin", &refspec]).await {
            Ok(_) => None,
            Err(e) => {
                warn!(branch = %branch, error = %e, "Push failed");
                Some(e.to_string())
            }
        }
    }
}

#[async_trait]
impl SourceControl for GitSourceControl {
    fn repository_url(&self) -> Option<String> {
        self.config.repo_url.clone()
    }

    fn default_branch(&self) -> String {
        self.config.default_branch.clone()
    }

    async fn prepare_working_copy(&self, repo_url: &str) -> Result<CloneInfo, CollaboratorError> {
        let work = &self.config.work_directory;
        tokio::fs::create_dir_all(work).await?;
        let target = work.join(CHECKOUT_DIR);
        if tokio::fs::try_exists(&target).await? {
            tokio::fs::remove_dir_all(&target).await?;
        }

        let source = authenticated_url(repo_url, self.config.token.as_deref());
        let target_arg = target.to_string_lossy().to_string();
        self.git(work, &["clone", &source, &target_arg]).await?;

        let current_branch = self
            .git(&target, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .unwrap_or_default();
        let latest_commit = self
            .git(&target, &["rev-parse", "HEAD"])
            .await
            .unwrap_or_default();
        *self.checkout.lock() = Some(target.clone());
        *self.branch.lock() = None;

        info!(repo = %repo_url, path = %target.display(), "Cloned repository");
        Ok(CloneInfo {
            repo_url: repo_url.to_string(),
            local_path: target_arg,
            current_branch,
            latest_commit,
            status: "cloned_successfully".to_string(),
        })
    }

    async fn create_branch(&self, feature: &str) -> Result<BranchInfo, CollaboratorError> {
        let dir = self.checkout()?;
        let now = chrono::Local::now();
        let branch_name = format!(
            "ai_branch/{feature}-{}_{}",
            now.format("%Y%m%d"),
            now.timestamp()
        );

        self.git(&dir, &["checkout", "-b", &branch_name]).await?;
        let created_from = self
            .git(&dir, &["rev-parse", "HEAD"])
            .await
            .unwrap_or_default();
        *self.branch.lock() = Some(branch_name.clone());
        info!(branch = %branch_name, "Created feature branch");

        let push_error = self.push(&dir, &branch_name).await;
        Ok(BranchInfo {
            branch_name,
            base_branch: self.config.default_branch.clone(),
            created_from,
            status: "created_successfully".to_string(),
            pushed_to_remote: push_error.is_none(),
            push_error,
        })
    }

    async fn list_files(&self) -> Result<Vec<String>, CollaboratorError> {
        let dir = self.checkout()?;
        let listing = self.git(&dir, &["ls-files"]).await?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn write_file(
        &self,
        relative: &str,
        content: &str,
    ) -> Result<PathBuf, CollaboratorError> {
        let full = self.checkout()?.join(checked_relative(relative)?);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        debug!(path = %full.display(), bytes = content.len(), "Wrote file");
        Ok(full)
    }

    async fn read_file(&self, relative: &str) -> Result<String, CollaboratorError> {
        let full = self.checkout()?.join(checked_relative(relative)?);
        Ok(tokio::fs::read_to_string(full).await?)
    }

    async fn commit_files(
        &self,
        paths: &[String],
        message: &str,
    ) -> Result<CommitInfo, CollaboratorError> {
        let dir = self.checkout()?;
        for path in paths {
            checked_relative(path)?;
        }

        let mut add: Vec<&str> = vec!["add", "--"];
        add.extend(paths.iter().map(String::as_str));
        self.git(&dir, &add).await?;

        let name = format!("user.name={COMMIT_NAME}");
        let email = format!("user.email={COMMIT_EMAIL}");
        self.git(&dir, &["-c", &name, "-c", &email, "commit", "-m", message])
            .await?;
        let commit_hash = self.git(&dir, &["rev-parse", "HEAD"]).await?;
        info!(commit = %commit_hash, files = paths.len(), "Committed changes");

        let branch = self.branch.lock().clone();
        let push_error = match branch {
            Some(branch) => self.push(&dir, &branch).await,
            None => Some("no feature branch to push".to_string()),
        };
        Ok(CommitInfo {
            commit_hash,
            commit_message: message.to_string(),
            files_committed: paths.to_vec(),
            pushed_to_remote: push_error.is_none(),
            push_error,
        })
    }

    async fn open_change_request(
        &self,
        request: &ChangeRequest,
    ) -> Result<ChangeRequestInfo, CollaboratorError> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CollaboratorError::Unavailable("GitHub token".to_string()))?;
        let repo_url = self
            .config
            .repo_url
            .as_deref()
            .ok_or_else(|| CollaboratorError::Unavailable("GitHub repository URL".to_string()))?;
        let coords = RepoCoordinates::parse(repo_url).ok_or_else(|| {
            CollaboratorError::Rejected(format!("cannot parse repository URL {repo_url}"))
        })?;
        let base = self
            .config
            .api_base
            .clone()
            .unwrap_or_else(|| coords.api_base());
        let url = format!(
            "{}/repos/{}/{}/pulls",
            base.trim_end_matches('/'),
            coords.owner,
            coords.name
        );

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "devflow")
            .json(&json!({
                "title": request.title,
                "head": request.head,
                "base": request.base,
                "body": request.body,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() != 201 {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = resp.json().await?;
        let info = ChangeRequestInfo {
            number: value.get("number").and_then(Value::as_u64).unwrap_or_default(),
            url: value
                .get("html_url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        info!(number = info.number, url = %info.url, "Opened pull request");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn run(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn test_parse_coordinates() {
        let coords = RepoCoordinates::parse("https://github.com/acme/porting.git").unwrap();
        assert_eq!(coords.owner, "acme");
        assert_eq!(coords.name, "porting");
        assert_eq!(coords.api_base(), "https://api.github.com");

        let enterprise = RepoCoordinates::parse("https://git.corp.test/team/tool/").unwrap();
        assert_eq!(enterprise.name, "tool");
        assert_eq!(enterprise.api_base(), "https://git.corp.test/api/v3");

        assert!(RepoCoordinates::parse("git@github.com:acme/porting.git").is_none());
    }

    #[test]
    fn test_authenticated_url() {
        assert_eq!(
            authenticated_url("https://github.com/a/b", Some("tok")),
            "https://tok@github.com/a/b"
        );
        assert_eq!(
            authenticated_url("git@github.com:a/b", Some("tok")),
            "git@github.com:a/b"
        );
        assert_eq!(
            authenticated_url("https://github.com/a/b", None),
            "https://github.com/a/b"
        );
    }

    #[test]
    fn test_checked_relative_rejects_escape() {
        assert!(checked_relative("src/main.c").is_ok());
        assert!(checked_relative("../etc/passwd").is_err());
        assert!(checked_relative("/abs").is_err());
        assert!(checked_relative(" ").is_err());
    }

    #[tokio::test]
    async fn test_operations_require_checkout() {
        let scm = GitSourceControl::new(GitConfig::default());
        let err = scm.list_files().await.unwrap_err();
        assert_eq!(err.code(), "rejected");
    }

    #[tokio::test]
    async fn test_open_change_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/porting/pulls"))
            .and(header("authorization", "token ghp_test"))
            .and(body_partial_json(json!({"head": "ai_branch/x", "base": "main"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 17,
                "html_url": "https://github.com/acme/porting/pull/17"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scm = GitSourceControl::new(GitConfig {
            repo_url: Some("https://github.com/acme/porting".into()),
            token: Some("ghp_test".into()),
            api_base: Some(server.uri()),
            ..GitConfig::default()
        });
        let info = scm
            .open_change_request(&ChangeRequest {
                title: "AI-Generated: Port".into(),
                body: "body".into(),
                head: "ai_branch/x".into(),
                base: "main".into(),
            })
            .await
            .unwrap();
        assert_eq!(info.number, 17);
        assert_eq!(info.url, "https://github.com/acme/porting/pull/17");
    }

    #[tokio::test]
    async fn test_change_request_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("A pull request already exists"))
            .mount(&server)
            .await;

        let scm = GitSourceControl::new(GitConfig {
            repo_url: Some("https://github.com/acme/porting".into()),
            token: Some("ghp_test".into()),
            api_base: Some(server.uri()),
            ..GitConfig::default()
        });
        let request = ChangeRequest {
            title: "t".into(),
            body: "b".into(),
            head: "h".into(),
            base: "main".into(),
        };
        let err = scm.open_change_request(&request).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_change_request_without_token_is_unavailable() {
        let scm = GitSourceControl::new(GitConfig {
            repo_url: Some("https://github.com/acme/porting".into()),
            ..GitConfig::default()
        });
        let request = ChangeRequest {
            title: "t".into(),
            body: "b".into(),
            head: "h".into(),
            base: "main".into(),
        };
        let err = scm.open_change_request(&request).await.unwrap_err();
        assert_eq!(err.code(), "unavailable");
    }

    #[tokio::test]
    async fn test_clone_branch_write_commit() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();
        run(&origin, &["init", "-q", "-b", "main"]);
        std::fs::write(origin.join("main.c"), "int main(void) { return 0; }\n").unwrap();
        run(&origin, &["add", "main.c"]);
        run(
            &origin,
            &["-c", "user.name=t", "-c", "user.email=t@t", "commit", "-q", "-m", "init"],
        );
        run(&origin, &["config", "receive.denyCurrentBranch", "ignore"]);

        let scm = GitSourceControl::new(GitConfig {
            work_directory: dir.path().join("work"),
            default_branch: "main".into(),
            ..GitConfig::default()
        });
        let clone = scm
            .prepare_working_copy(&origin.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(clone.status, "cloned_successfully");
        assert_eq!(scm.list_files().await.unwrap(), vec!["main.c"]);

        let branch = scm.create_branch("windows-metrics").await.unwrap();
        assert!(branch.branch_name.starts_with("ai_branch/windows-metrics-"));
        assert!(branch.pushed_to_remote);

        let full = scm.write_file("src/port.c", "/* port */\n").await.unwrap();
        assert!(full.ends_with("src/port.c"));
        assert_eq!(scm.read_file("src/port.c").await.unwrap(), "/* port */\n");

        let commit = scm
            .commit_files(&["src/port.c".to_string()], "Add port")
            .await
            .unwrap();
        assert_eq!(commit.files_committed, vec!["src/port.c"]);
        assert!(!commit.commit_hash.is_empty());
    }
}
