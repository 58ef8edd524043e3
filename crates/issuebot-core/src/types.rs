use crate::config::sanitize_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// User / Label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }

    /// GitHub app accounts carry a `[bot]` suffix on their login.
    pub fn is_bot(&self) -> bool {
        self.login.ends_with("[bot]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ---------------------------------------------------------------------------
// IssueState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueState::Open => f.write_str("open"),
            IssueState::Closed => f.write_str("closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Issue / PullRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub state: IssueState,
    #[serde(default)]
    pub html_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub draft: bool,
}

/// The narrow view of an issue or pull request the classifier and the
/// staleness machine operate on.
pub trait IssueLike {
    fn number(&self) -> u64;
    fn title(&self) -> &str;
    fn body(&self) -> &str;
    fn labels(&self) -> &[Label];
    fn author(&self) -> &str;

    /// Label names compare like GitHub does: trimmed and case-insensitive.
    fn has_label(&self, name: &str) -> bool {
        let wanted = sanitize_key(name);
        self.labels().iter().any(|l| sanitize_key(&l.name) == wanted)
    }

    fn label_names(&self) -> Vec<&str> {
        self.labels().iter().map(|l| l.name.as_str()).collect()
    }
}

impl IssueLike for Issue {
    fn number(&self) -> u64 {
        self.number
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
    fn labels(&self) -> &[Label] {
        &self.labels
    }
    fn author(&self) -> &str {
        &self.user.login
    }
}

impl IssueLike for PullRequest {
    fn number(&self) -> u64 {
        self.number
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
    fn labels(&self) -> &[Label] {
        &self.labels
    }
    fn author(&self) -> &str {
        &self.user.login
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub user: User,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn author(&self) -> &str {
        &self.user.login
    }
}

/// Sort comments newest first. Comments sharing a timestamp are ordered by
/// descending id, so the later-created comment still comes first.
pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
