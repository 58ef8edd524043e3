//! In-memory collaborators for tests. Enabled for this crate's own tests and,
//! through the `testing` feature, for downstream crates' tests.

use crate::error::{BotError, Result};
use crate::github::{GitHubReader, GitHubWriter, Mailer, StyledEmail};
use crate::types::{Comment, Issue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeGitHub {
    pub templates: HashMap<String, String>,
    pub comments: HashMap<u64, Vec<Comment>>,
    pub collaborators: HashSet<String>,
    pub open_issues: Vec<Issue>,
    /// Issue numbers whose comment fetch fails.
    pub failing_comments: HashSet<u64>,
    pub collaborators_fail: bool,
    /// Write calls, recorded as `"<op> <org>/<repo>#<n> <arg>"`.
    pub writes: Mutex<Vec<String>>,
    /// Labels whose add/remove call fails.
    pub failing_labels: HashSet<String>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, path: &str, text: &str) -> Self {
        self.templates.insert(path.to_string(), text.to_string());
        self
    }

    pub fn with_collaborator(mut self, login: &str) -> Self {
        self.collaborators.insert(login.to_string());
        self
    }

    pub fn with_issue(mut self, issue: Issue, comments: Vec<Comment>) -> Self {
        self.comments.insert(issue.number, comments);
        self.open_issues.push(issue);
        self
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut w) = self.writes.lock() {
            w.push(entry);
        }
    }
}

#[async_trait]
impl GitHubReader for FakeGitHub {
    async fn fetch_issue_template(&self, org: &str, repo: &str, path: &str) -> Result<String> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| BotError::NotFound(format!("{org}/{repo}/{path}")))
    }

    async fn fetch_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>> {
        if self.failing_comments.contains(&number) {
            return Err(BotError::Upstream(format!("{org}/{repo}#{number}: 502")));
        }
        Ok(self.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn fetch_collaborators(&self, org: &str, repo: &str) -> Result<HashSet<String>> {
        if self.collaborators_fail {
            return Err(BotError::Auth(format!("{org}/{repo}: 403")));
        }
        Ok(self.collaborators.clone())
    }

    async fn fetch_open_issues(&self, _org: &str, _repo: &str) -> Result<Vec<Issue>> {
        Ok(self.open_issues.clone())
    }
}

#[async_trait]
impl GitHubWriter for FakeGitHub {
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<()> {
        if self.failing_labels.contains(label) {
            return Err(BotError::Upstream(format!("cannot add {label}")));
        }
        self.record(format!("add_label {org}/{repo}#{number} {label}"));
        Ok(())
    }

    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<()> {
        if self.failing_labels.contains(label) {
            return Err(BotError::Upstream(format!("cannot remove {label}")));
        }
        self.record(format!("remove_label {org}/{repo}#{number} {label}"));
        Ok(())
    }

    async fn add_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        self.record(format!("comment {org}/{repo}#{number} {body}"));
        Ok(())
    }

    async fn close_issue(&self, org: &str, repo: &str, number: u64) -> Result<()> {
        self.record(format!("close {org}/{repo}#{number}"));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<StyledEmail>>,
}

impl FakeMailer {
    pub fn sent(&self) -> Vec<StyledEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_styled_email(&self, email: &StyledEmail) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
