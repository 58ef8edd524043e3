//! Executes actions against the real collaborators and records an audit
//! trail. Every `Action` variant maps to exactly one collaborator call.

use crate::action::Action;
use crate::error::{BotError, Result};
use crate::github::{GitHubWriter, Mailer, StyledEmail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AuditRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// Nothing to execute (NoOp).
    Skipped,
    Failed { error: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub action: Action,
    pub outcome: Outcome,
}

impl AuditRecord {
    fn new(action: Action, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            action,
            outcome,
        }
    }
}

/// Append-only JSON-lines audit file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, records: &[AuditRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for record in records {
            text.push_str(&serde_json::to_string(record)?);
            text.push('\n');
        }
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(text.as_bytes())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dispatcher {
    writer: Arc<dyn GitHubWriter>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl Dispatcher {
    pub fn new(writer: Arc<dyn GitHubWriter>) -> Self {
        Self { writer, mailer: None }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Execute one action. Failures are captured in the record, never
    /// returned, so one bad action does not stop the rest.
    pub async fn dispatch(&self, action: Action) -> AuditRecord {
        let outcome = match self.execute(&action).await {
            Ok(true) => Outcome::Applied,
            Ok(false) => Outcome::Skipped,
            Err(e) => {
                warn!(action = %action, error = %e, "action failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        if !outcome.is_failure() {
            info!(action = %action, outcome = ?outcome, "dispatched");
        }
        AuditRecord::new(action, outcome)
    }

    /// Execute actions in order.
    pub async fn dispatch_all(&self, actions: Vec<Action>) -> Vec<AuditRecord> {
        let mut records = Vec::with_capacity(actions.len());
        for action in actions {
            records.push(self.dispatch(action).await);
        }
        records
    }

    async fn execute(&self, action: &Action) -> Result<bool> {
        match action {
            Action::AddLabel { issue, label, .. } => {
                self.writer
                    .add_label(&issue.org, &issue.repo, issue.number, label)
                    .await?
            }
            Action::RemoveLabel { issue, label, .. } => {
                self.writer
                    .remove_label(&issue.org, &issue.repo, issue.number, label)
                    .await?
            }
            Action::Comment {
                issue,
                message,
                collapse,
                ..
            } => {
                let body = if *collapse {
                    collapsed(message)
                } else {
                    message.clone()
                };
                self.writer
                    .add_comment(&issue.org, &issue.repo, issue.number, &body)
                    .await?
            }
            Action::Close { issue, .. } => {
                self.writer
                    .close_issue(&issue.org, &issue.repo, issue.number)
                    .await?
            }
            Action::NoOp { .. } => return Ok(false),
            Action::SendEmail {
                recipient,
                subject,
                header,
                body,
                link,
                action_label,
                ..
            } => {
                let mailer = self
                    .mailer
                    .as_ref()
                    .ok_or_else(|| BotError::MissingMailer(recipient.clone()))?;
                let email = StyledEmail {
                    recipient: recipient.clone(),
                    subject: subject.clone(),
                    header: header.clone(),
                    body_html: body_html(body),
                    link: link.clone(),
                    action_label: action_label.clone(),
                };
                mailer.send_styled_email(&email).await?
            }
        }
        Ok(true)
    }
}

/// Fold a comment behind a `<details>` toggle.
fn collapsed(message: &str) -> String {
    let summary = message.lines().next().unwrap_or("Details");
    format!("<details>\n<summary>{summary}</summary>\n\n{message}\n</details>")
}

fn body_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escaped
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::IssueRef;
    use crate::testing::{FakeGitHub, FakeMailer};

    fn issue() -> IssueRef {
        IssueRef::new("acme", "sdk", 3)
    }

    fn email() -> Action {
        Action::SendEmail {
            recipient: "team@example.com".into(),
            subject: "New issue".into(),
            header: "Labeled".into(),
            body: "Crash\n\n<script> & more".into(),
            link: "https://github.com/acme/sdk/issues/3".into(),
            action_label: "Open Issue".into(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn each_action_maps_to_one_call() {
        let gh = Arc::new(FakeGitHub::new());
        let dispatcher = Dispatcher::new(gh.clone());
        let records = dispatcher
            .dispatch_all(vec![
                Action::remove_label(&issue(), "needs-info", "r"),
                Action::add_label(&issue(), "stale", "r"),
                Action::comment(&issue(), "hello", "r"),
                Action::close(&issue(), "r"),
                Action::no_op(&issue(), "collaborator"),
            ])
            .await;
        assert_eq!(
            gh.writes(),
            vec![
                "remove_label acme/sdk#3 needs-info",
                "add_label acme/sdk#3 stale",
                "comment acme/sdk#3 hello",
                "close acme/sdk#3",
            ]
        );
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].outcome, Outcome::Skipped);
        assert!(records[..4].iter().all(|r| r.outcome == Outcome::Applied));
    }

    #[tokio::test]
    async fn collapsed_comment_is_folded() {
        let gh = Arc::new(FakeGitHub::new());
        let dispatcher = Dispatcher::new(gh.clone());
        let action = Action::Comment {
            issue: issue(),
            message: "Summary line\nmore".into(),
            collapse: true,
            reason: None,
        };
        dispatcher.dispatch(action).await;
        let writes = gh.writes();
        assert!(writes[0].contains("<details>\n<summary>Summary line</summary>"));
    }

    #[tokio::test]
    async fn failure_is_recorded_and_does_not_stop_the_batch() {
        let mut fake = FakeGitHub::new();
        fake.failing_labels.insert("broken".into());
        let gh = Arc::new(fake);
        let dispatcher = Dispatcher::new(gh.clone());
        let records = dispatcher
            .dispatch_all(vec![
                Action::add_label(&issue(), "broken", "r"),
                Action::close(&issue(), "r"),
            ])
            .await;
        assert!(records[0].outcome.is_failure());
        assert_eq!(records[1].outcome, Outcome::Applied);
        assert_eq!(gh.writes(), vec!["close acme/sdk#3"]);
    }

    #[tokio::test]
    async fn email_without_mailer_fails() {
        let dispatcher = Dispatcher::new(Arc::new(FakeGitHub::new()));
        let record = dispatcher.dispatch(email()).await;
        match record.outcome {
            Outcome::Failed { error } => assert!(error.contains("team@example.com")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn email_is_sent_with_escaped_html() {
        let mailer = Arc::new(FakeMailer::default());
        let dispatcher = Dispatcher::new(Arc::new(FakeGitHub::new())).with_mailer(mailer.clone());
        let record = dispatcher.dispatch(email()).await;
        assert_eq!(record.outcome, Outcome::Applied);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body_html, "<p>Crash</p><p>&lt;script&gt; &amp; more</p>");
    }

    #[test]
    fn audit_log_appends_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("logs/audit.jsonl"));
        let record = AuditRecord::new(Action::close(&issue(), "stale"), Outcome::Applied);
        log.append(std::slice::from_ref(&record)).unwrap();
        log.append(&[record]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.outcome, Outcome::Applied);
        assert!(lines[0].contains("\"type\":\"close\""));
        assert!(lines[0].contains("\"status\":\"applied\""));
    }
}
