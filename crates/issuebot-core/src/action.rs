//! Side-effect-free intents produced by the classifier and the staleness
//! machine. A dispatcher executes each one against the collaborators.

use crate::config::sanitize_key;
use crate::error::BotError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// IssueRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AddLabel,
    RemoveLabel,
    Comment,
    Close,
    NoOp,
    SendEmail,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::AddLabel,
            ActionType::RemoveLabel,
            ActionType::Comment,
            ActionType::Close,
            ActionType::NoOp,
            ActionType::SendEmail,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::AddLabel => "add_label",
            ActionType::RemoveLabel => "remove_label",
            ActionType::Comment => "comment",
            ActionType::Close => "close",
            ActionType::NoOp => "no_op",
            ActionType::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BotError::UnknownActionType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AddLabel {
        issue: IssueRef,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    RemoveLabel {
        issue: IssueRef,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Comment {
        issue: IssueRef,
        message: String,
        /// Render the comment folded away in the GitHub UI.
        #[serde(default)]
        collapse: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Close {
        issue: IssueRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    NoOp {
        issue: IssueRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    SendEmail {
        recipient: String,
        subject: String,
        header: String,
        body: String,
        link: String,
        action_label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Action {
    pub fn add_label(issue: &IssueRef, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Action::AddLabel {
            issue: issue.clone(),
            label: label.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn remove_label(
        issue: &IssueRef,
        label: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Action::RemoveLabel {
            issue: issue.clone(),
            label: label.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn comment(issue: &IssueRef, message: impl Into<String>, reason: impl Into<String>) -> Self {
        Action::Comment {
            issue: issue.clone(),
            message: message.into(),
            collapse: false,
            reason: Some(reason.into()),
        }
    }

    pub fn close(issue: &IssueRef, reason: impl Into<String>) -> Self {
        Action::Close {
            issue: issue.clone(),
            reason: Some(reason.into()),
        }
    }

    pub fn no_op(issue: &IssueRef, reason: impl Into<String>) -> Self {
        Action::NoOp {
            issue: issue.clone(),
            reason: Some(reason.into()),
        }
    }

    pub fn kind(&self) -> ActionType {
        match self {
            Action::AddLabel { .. } => ActionType::AddLabel,
            Action::RemoveLabel { .. } => ActionType::RemoveLabel,
            Action::Comment { .. } => ActionType::Comment,
            Action::Close { .. } => ActionType::Close,
            Action::NoOp { .. } => ActionType::NoOp,
            Action::SendEmail { .. } => ActionType::SendEmail,
        }
    }

    /// The issue this action targets; `None` for email.
    pub fn issue(&self) -> Option<&IssueRef> {
        match self {
            Action::AddLabel { issue, .. }
            | Action::RemoveLabel { issue, .. }
            | Action::Comment { issue, .. }
            | Action::Close { issue, .. }
            | Action::NoOp { issue, .. } => Some(issue),
            Action::SendEmail { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Action::AddLabel { reason, .. }
            | Action::RemoveLabel { reason, .. }
            | Action::Comment { reason, .. }
            | Action::Close { reason, .. }
            | Action::NoOp { reason, .. }
            | Action::SendEmail { reason, .. } => reason.as_deref(),
        }
    }

    /// One-line description for logs and the audit trail.
    pub fn details(&self) -> String {
        match self {
            Action::AddLabel { issue, label, .. } => format!("{issue}: add label '{label}'"),
            Action::RemoveLabel { issue, label, .. } => {
                format!("{issue}: remove label '{label}'")
            }
            Action::Comment {
                issue,
                message,
                collapse,
                ..
            } => {
                let preview: String = message.chars().take(60).collect();
                let folded = if *collapse { " (collapsed)" } else { "" };
                format!("{issue}: comment{folded} \"{}\"", preview.replace('\n', " "))
            }
            Action::Close { issue, .. } => format!("{issue}: close"),
            Action::NoOp { issue, .. } => format!("{issue}: no action"),
            Action::SendEmail {
                recipient, subject, ..
            } => format!("email {recipient}: \"{subject}\""),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.details())?;
        if let Some(reason) = self.reason() {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

impl Action {
    fn reason_mut(&mut self) -> &mut Option<String> {
        match self {
            Action::AddLabel { reason, .. }
            | Action::RemoveLabel { reason, .. }
            | Action::Comment { reason, .. }
            | Action::Close { reason, .. }
            | Action::NoOp { reason, .. }
            | Action::SendEmail { reason, .. } => reason,
        }
    }

    /// True when both actions change GitHub the same way. Reasons are
    /// ignored and label names compare case-insensitively.
    pub fn same_effect(&self, other: &Action) -> bool {
        match (self, other) {
            (
                Action::AddLabel { issue: a, label: la, .. },
                Action::AddLabel { issue: b, label: lb, .. },
            )
            | (
                Action::RemoveLabel { issue: a, label: la, .. },
                Action::RemoveLabel { issue: b, label: lb, .. },
            ) => a == b && sanitize_key(la) == sanitize_key(lb),
            _ => {
                let mut a = self.clone();
                let mut b = other.clone();
                *a.reason_mut() = None;
                *b.reason_mut() = None;
                a == b
            }
        }
    }
}

/// Drop actions with the same effect as an earlier one, keeping the first.
pub fn dedup_actions(actions: Vec<Action>) -> Vec<Action> {
    let mut out: Vec<Action> = Vec::with_capacity(actions.len());
    for action in actions {
        if !out.iter().any(|kept| kept.same_effect(&action)) {
            out.push(action);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
