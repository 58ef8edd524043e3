//! Collaborator interfaces the core calls through. Concrete implementations
//! live in `issuebot-github`; tests use in-memory fakes.

use crate::error::Result;
use crate::types::{Comment, Issue};
use async_trait::async_trait;
use std::collections::HashSet;

/// Read access to GitHub.
#[async_trait]
pub trait GitHubReader: Send + Sync {
    /// Raw text of a file in the repo's default branch.
    async fn fetch_issue_template(&self, org: &str, repo: &str, path: &str) -> Result<String>;

    /// Comments on an issue, in no guaranteed order.
    async fn fetch_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>>;

    /// Logins with collaborator access to the repo.
    async fn fetch_collaborators(&self, org: &str, repo: &str) -> Result<HashSet<String>>;

    /// Open issues (pull requests excluded).
    async fn fetch_open_issues(&self, org: &str, repo: &str) -> Result<Vec<Issue>>;
}

/// Write access to GitHub.
#[async_trait]
pub trait GitHubWriter: Send + Sync {
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<()>;
    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<()>;
    async fn add_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()>;
    async fn close_issue(&self, org: &str, repo: &str, number: u64) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledEmail {
    pub recipient: String,
    pub subject: String,
    pub header: String,
    pub body_html: String,
    pub link: String,
    pub action_label: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_styled_email(&self, email: &StyledEmail) -> Result<()>;
}
