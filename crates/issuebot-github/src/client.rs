//! GitHub REST client implementing the core's reader and writer traits.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use issuebot_core::github::{GitHubReader, GitHubWriter};
use issuebot_core::types::{Comment, Issue, User};
use reqwest::{header, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("issuebot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    page_size: usize,
}

/// Entries of `GET /repos/{owner}/{repo}/issues`; pull requests carry a
/// `pull_request` key and are dropped.
#[derive(Deserialize)]
struct IssueListEntry {
    #[serde(flatten)]
    issue: Issue,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            page_size: 100,
        })
    }

    /// Items requested per page on list endpoints (GitHub caps this at 100).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, 100);
        self
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// Build `base/seg1/seg2/...`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, org: &str, repo: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos", org, repo];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_accepting(method, url, "application/vnd.github+json")
    }

    fn request_accepting(&self, method: Method, url: Url, accept: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, url)
            .header(header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, method: &'static str, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Status {
            method,
            url,
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }

    /// Follow `page=1,2,...` until a short page comes back.
    async fn get_paged<T: DeserializeOwned>(&self, mut url: Url, extra: &[(&str, &str)]) -> Result<Vec<T>> {
        let per_page = self.page_size.to_string();
        let mut out = Vec::new();
        let mut page = 1usize;
        loop {
            {
                let mut query = url.query_pairs_mut();
                query.clear();
                for (k, v) in extra {
                    query.append_pair(k, v);
                }
                query.append_pair("per_page", &per_page);
                query.append_pair("page", &page.to_string());
            }
            let resp = self.send("GET", self.request(Method::GET, url.clone())).await?;
            let batch: Vec<T> = resp.json().await?;
            let done = batch.len() < self.page_size;
            out.extend(batch);
            if done {
                return Ok(out);
            }
            page += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// GitHubReader
// ---------------------------------------------------------------------------

#[async_trait]
impl GitHubReader for GitHubClient {
    async fn fetch_issue_template(&self, org: &str, repo: &str, path: &str) -> issuebot_core::Result<String> {
        let mut rest = vec!["contents"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = self.repo_url(org, repo, &rest)?;
        let req = self.request_accepting(Method::GET, url, "application/vnd.github.raw+json");
        let resp = self.send("GET", req).await?;
        Ok(resp.text().await.map_err(ClientError::from)?)
    }

    async fn fetch_comments(&self, org: &str, repo: &str, number: u64) -> issuebot_core::Result<Vec<Comment>> {
        let n = number.to_string();
        let url = self.repo_url(org, repo, &["issues", &n, "comments"])?;
        Ok(self.get_paged(url, &[]).await?)
    }

    async fn fetch_collaborators(&self, org: &str, repo: &str) -> issuebot_core::Result<HashSet<String>> {
        let url = self.repo_url(org, repo, &["collaborators"])?;
        let users: Vec<User> = self.get_paged(url, &[]).await?;
        Ok(users.into_iter().map(|u| u.login).collect())
    }

    async fn fetch_open_issues(&self, org: &str, repo: &str) -> issuebot_core::Result<Vec<Issue>> {
        let url = self.repo_url(org, repo, &["issues"])?;
        let entries: Vec<IssueListEntry> = self.get_paged(url, &[("state", "open")]).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.pull_request.is_none())
            .map(|e| e.issue)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// GitHubWriter
// ---------------------------------------------------------------------------

#[async_trait]
impl GitHubWriter for GitHubClient {
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> issuebot_core::Result<()> {
        let n = number.to_string();
        let url = self.repo_url(org, repo, &["issues", &n, "labels"])?;
        let req = self
            .request(Method::POST, url)
            .json(&json!({ "labels": [label] }));
        self.send("POST", req).await?;
        Ok(())
    }

    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> issuebot_core::Result<()> {
        let n = number.to_string();
        let url = self.repo_url(org, repo, &["issues", &n, "labels", label])?;
        match self.send("DELETE", self.request(Method::DELETE, url)).await {
            Ok(_) => Ok(()),
            // Already gone.
            Err(e) if e.status() == Some(404) => {
                debug!(org, repo, number, label, "label not present");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> issuebot_core::Result<()> {
        let n = number.to_string();
        let url = self.repo_url(org, repo, &["issues", &n, "comments"])?;
        let req = self.request(Method::POST, url).json(&json!({ "body": body }));
        self.send("POST", req).await?;
        Ok(())
    }

    async fn close_issue(&self, org: &str, repo: &str, number: u64) -> issuebot_core::Result<()> {
        let n = number.to_string();
        let url = self.repo_url(org, repo, &["issues", &n])?;
        let req = self
            .request(Method::PATCH, url)
            .json(&json!({ "state": "closed", "state_reason": "not_planned" }));
        self.send("PATCH", req).await?;
        Ok(())
    }
}
