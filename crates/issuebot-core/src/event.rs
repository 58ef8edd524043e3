//! Webhook payloads, reduced to the fields the bot consumes.

use crate::types::{Comment, Issue, Label, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
}

impl Repository {
    pub fn org(&self) -> &str {
        &self.owner.login
    }
}

/// Present on `issues` events; `old_issue` is only set when the issue was
/// transferred in from another repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueChanges {
    #[serde(default)]
    pub old_issue: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: Issue,
    pub repository: Repository,
    #[serde(default)]
    pub changes: Option<IssueChanges>,
    #[serde(default)]
    pub label: Option<Label>,
    #[serde(default)]
    pub sender: Option<User>,
}

impl IssuesEvent {
    pub fn is_transferred(&self) -> bool {
        self.changes
            .as_ref()
            .map(|c| c.old_issue.is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
    pub repository: Repository,
}
