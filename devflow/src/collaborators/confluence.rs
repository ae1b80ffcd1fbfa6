//! Confluence REST document store.

use super::documents::{DocumentStore, PageKind, PageRef, PageRequest};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Connection settings for [`ConfluenceStore`].
#[derive(Debug, Clone)]
pub struct ConfluenceConfig {
    /// Site URL, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    /// Account email.
    pub email: String,
    /// API token.
    pub api_token: String,
    /// Space that holds the pages.
    pub space_key: String,
}

/// [`DocumentStore`] backed by the Confluence content API.
#[derive(Debug, Clone)]
pub struct ConfluenceStore {
    http: reqwest::Client,
    config: ConfluenceConfig,
    authorization: String,
}

impl ConfluenceStore {
    /// Creates the store.
    #[must_use]
    pub fn new(config: ConfluenceConfig) -> Self {
        let credentials = format!("{}:{}", config.email, config.api_token);
        Self {
            http: reqwest::Client::new(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            config,
        }
    }

    fn site(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn content_url(&self) -> String {
        format!("{}/wiki/rest/api/content", self.site())
    }

    fn page_ref(&self, value: &Value, title: &str) -> Result<PageRef, CollaboratorError> {
        let id = match value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(CollaboratorError::Decode("page has no id".to_string())),
        };
        let webui = value
            .pointer("/_links/webui")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(PageRef {
            id,
            url: format!("{}/wiki{webui}", self.site()),
            title: title.to_string(),
        })
    }

    fn render(request: &PageRequest) -> String {
        match request.kind {
            PageKind::Folder => folder_storage(&request.title, &request.body_markdown),
            PageKind::Document => document_storage(&request.body_markdown),
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, CollaboratorError> {
        let resp = builder
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    /// Finds a page by exact title in the space.
    async fn find_by_title(&self, title: &str) -> Result<Option<(String, u64)>, CollaboratorError> {
        let found = self
            .send(self.http.get(self.content_url()).query(&[
                ("title", title),
                ("spaceKey", self.config.space_key.as_str()),
                ("expand", "version"),
            ]))
            .await?;
        let Some(page) = found
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
        else {
            return Ok(None);
        };
        let id = match page.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Ok(None),
        };
        let version = page
            .pointer("/version/number")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        Ok(Some((id, version)))
    }

    async fn create(&self, request: &PageRequest) -> Result<PageRef, CollaboratorError> {
        let mut body = json!({
            "type": "page",
            "title": request.title,
            "space": {"key": self.config.space_key},
            "body": {"storage": {"value": Self::render(request), "representation": "storage"}},
        });
        if let Some(parent) = &request.parent_id {
            body["ancestors"] = json!([{"id": parent}]);
        }
        let created = self.send(self.http.post(self.content_url()).json(&body)).await?;
        self.page_ref(&created, &request.title)
    }

    async fn update(
        &self,
        request: &PageRequest,
        id: &str,
        version: u64,
    ) -> Result<PageRef, CollaboratorError> {
        let body = json!({
            "id": id,
            "type": "page",
            "title": request.title,
            "version": {"number": version + 1},
            "body": {"storage": {"value": Self::render(request), "representation": "storage"}},
        });
        let url = format!("{}/{id}", self.content_url());
        let updated = self.send(self.http.put(url).json(&body)).await?;
        self.page_ref(&updated, &request.title)
    }
}

#[async_trait]
impl DocumentStore for ConfluenceStore {
    async fn publish_page(&self, request: &PageRequest) -> Result<PageRef, CollaboratorError> {
        let page = if request.parent_id.is_some() {
            self.create(request).await?
        } else if let Some((id, version)) = self.find_by_title(&request.title).await? {
            debug!(page_id = %id, version, "Updating existing page");
            self.update(request, &id, version).await?
        } else {
            self.create(request).await?
        };
        info!(page_id = %page.id, title = %page.title, "Published page");
        Ok(page)
    }
}

fn banner(title: &str, text: &str) -> String {
    format!(
        "<ac:structured-macro ac:name=\"info\" ac:schema-version=\"1\">\n\
         <ac:parameter ac:name=\"title\">{title}</ac:parameter>\n\
         <ac:rich-text-body>\n<p>{text}</p>\n</ac:rich-text-body>\n\
         </ac:structured-macro>"
    )
}

fn now_display() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn document_storage(markdown: &str) -> String {
    format!(
        "{}\n\n{}",
        banner(
            "AI-Generated Documentation",
            &format!(
                "This page was automatically generated by devflow on {}",
                now_display()
            ),
        ),
        markdown_to_storage(markdown)
    )
}

fn folder_storage(title: &str, overview: &str) -> String {
    format!(
        "{}\n\n<h1>Project Overview: {title}</h1>\n{}\n\n<h2>Contents</h2>\n\
         <ul>\n<li>Requirements Documentation</li>\n<li>Technical Design Specification</li>\n\
         <li>Implementation Documentation</li>\n</ul>\n\n\
         <ac:structured-macro ac:name=\"children\" ac:schema-version=\"2\">\n\
         <ac:parameter ac:name=\"all\">true</ac:parameter>\n</ac:structured-macro>",
        banner(
            "AI-Generated Project Folder",
            &format!("This folder was automatically created by devflow on {}", now_display()),
        ),
        markdown_to_storage(overview)
    )
}

struct Rules {
    fence: Regex,
    headers: [(Regex, &'static str); 4],
    inline_code: Regex,
    bold: Regex,
    italic: Regex,
    numbered: Regex,
    blank_runs: Regex,
}

fn rules() -> Option<&'static Rules> {
    static RULES: OnceLock<Option<Rules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            Some(Rules {
                fence: Regex::new(r"(?s)```(\w+)?\s*\n(.*?)\n```").ok()?,
                headers: [
                    (Regex::new(r"(?m)^#### (.+)$").ok()?, "<h4>$1</h4>"),
                    (Regex::new(r"(?m)^### (.+)$").ok()?, "<h3>$1</h3>"),
                    (Regex::new(r"(?m)^## (.+)$").ok()?, "<h2>$1</h2>"),
                    (Regex::new(r"(?m)^# (.+)$").ok()?, "<h1>$1</h1>"),
                ],
                inline_code: Regex::new(r"`([^`]+)`").ok()?,
                bold: Regex::new(r"\*\*([^*]+)\*\*").ok()?,
                italic: Regex::new(r"\*([^*\n]+)\*").ok()?,
                numbered: Regex::new(r"^\d+\. ").ok()?,
                blank_runs: Regex::new(r"\n\s*\n\s*\n").ok()?,
            })
        })
        .as_ref()
}

/// Converts markdown into Confluence storage markup.
///
/// Covers what generated documents use: headers, fenced code (kept as plain
/// text), inline code, bold, italic, bullet and numbered lists, paragraphs.
#[must_use]
pub fn markdown_to_storage(markdown: &str) -> String {
    let Some(rules) = rules() else {
        return format!("<p>{}</p>", markdown.trim());
    };

    let mut text = rules
        .fence
        .replace_all(markdown.trim(), |caps: &regex::Captures<'_>| {
            caps.get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        })
        .into_owned();
    for (re, replacement) in &rules.headers {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text = rules
        .inline_code
        .replace_all(&text, "<code>$1</code>")
        .into_owned();
    text = rules.bold.replace_all(&text, "<strong>$1</strong>").into_owned();
    text = rules.italic.replace_all(&text, "<em>$1</em>").into_owned();

    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let stripped = line.trim();
            if stripped.is_empty() {
                String::new()
            } else if let Some(item) = stripped.strip_prefix("- ") {
                format!("<p>\u{2022} {}</p>", item.trim())
            } else if rules.numbered.is_match(stripped) {
                format!("<p>{stripped}</p>")
            } else if stripped.starts_with("<h")
                || stripped.starts_with("<ac:structured-macro")
                || stripped.ends_with("</ac:structured-macro>")
            {
                line.to_string()
            } else {
                format!("<p>{stripped}</p>")
            }
        })
        .collect();

    rules
        .blank_runs
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> ConfluenceStore {
        ConfluenceStore::new(ConfluenceConfig {
            base_url: server.uri(),
            email: "bot@acme.test".into(),
            api_token: "secret".into(),
            space_key: "ENG".into(),
        })
    }

    #[test]
    fn test_markdown_conversion() {
        let storage = markdown_to_storage(
            "# Title\n\nSome **bold** and *soft* `code`.\n\n- first\n1. numbered",
        );
        assert_eq!(
            storage,
            "<h1>Title</h1>\n\n<p>Some <strong>bold</strong> and <em>soft</em> \
             <code>code</code>.</p>\n\n<p>\u{2022} first</p>\n<p>1. numbered</p>"
        );
    }

    #[test]
    fn test_code_fence_becomes_text() {
        let storage = markdown_to_storage("```c\nint x;\n```");
        assert_eq!(storage, "<p>int x;</p>");
    }

    #[test]
    fn test_folder_has_children_macro() {
        let body = folder_storage("[AI-Generated] 1 Port", "Overview");
        assert!(body.contains("ac:name=\"children\""));
        assert!(body.contains("<p>Overview</p>"));
    }

    #[tokio::test]
    async fn test_child_page_is_created_under_parent() {
        let server = MockServer::start().await;
        let expected_auth = format!("Basic {}", STANDARD.encode("bot@acme.test:secret"));
        Mock::given(method("POST"))
            .and(path("/wiki/rest/api/content"))
            .and(header("authorization", expected_auth.as_str()))
            .and(body_partial_json(json!({
                "title": "1 Port - Requirements",
                "space": {"key": "ENG"},
                "ancestors": [{"id": "100"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "101",
                "_links": {"webui": "/spaces/ENG/pages/101"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = store(&server)
            .publish_page(&PageRequest::document("1 Port - Requirements", "# R").with_parent(Some("100")))
            .await
            .unwrap();
        assert_eq!(page.id, "101");
        assert_eq!(page.url, format!("{}/wiki/spaces/ENG/pages/101", server.uri()));
    }

    #[tokio::test]
    async fn test_existing_title_is_updated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content"))
            .and(query_param("title", "Folder"))
            .and(query_param("spaceKey", "ENG"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "7", "version": {"number": 3}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/wiki/rest/api/content/7"))
            .and(body_partial_json(json!({"version": {"number": 4}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7",
                "_links": {"webui": "/pages/7"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = store(&server)
            .publish_page(&PageRequest::folder("Folder", "overview"))
            .await
            .unwrap();
        assert_eq!(page.id, "7");
    }

    #[tokio::test]
    async fn test_missing_title_creates_top_level_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 55,
                "_links": {"webui": "/pages/55"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = store(&server)
            .publish_page(&PageRequest::document("Top", "body"))
            .await
            .unwrap();
        assert_eq!(page.id, "55");
        assert_eq!(page.title, "Top");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = store(&server)
            .publish_page(&PageRequest::document("T", "b").with_parent(Some("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Api { status: 403, .. }));
    }
}
