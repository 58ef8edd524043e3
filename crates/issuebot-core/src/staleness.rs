//! Needs-info / stale lifecycle.
//!
//! An issue's state comes from its current labels intersected with the
//! configured cleanup labels:
//!
//! - neither label: NORMAL, nothing to do
//! - `label_needs_info`: waiting on the reporter; moves to stale after
//!   `needs_info_days` without an update
//! - `label_stale`: closed `stale_days` after the mark-stale comment
//!
//! Both labels at once evaluates both branches and unions the actions.

use crate::action::{dedup_actions, Action, IssueRef};
use crate::config::{BotConfig, IssueCleanupConfig};
use crate::messages::{self, CLOSE_STALE_MARKER, MARK_STALE_MARKER};
use crate::types::{Comment, Issue, IssueLike, IssueState};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

pub struct StalenessContext<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub issue: &'a dyn IssueLike,
    /// Newest first; see [`crate::types::sort_newest_first`].
    pub comments: &'a [Comment],
    pub collaborators: &'a HashSet<String>,
    pub config: &'a IssueCleanupConfig,
    pub now: DateTime<Utc>,
}

impl StalenessContext<'_> {
    fn issue_ref(&self) -> IssueRef {
        IssueRef::new(self.org, self.repo, self.issue.number())
    }

    fn days_since(&self, at: DateTime<Utc>) -> i64 {
        (self.now - at).num_days()
    }

    fn last_comment_by(&self, pred: impl Fn(&Comment) -> bool) -> Option<&Comment> {
        self.comments.iter().find(|c| pred(c))
    }
}

/// True when the issue carries a label on the cleanup ignore list.
pub fn is_ignored(issue: &dyn IssueLike, config: &IssueCleanupConfig) -> bool {
    config
        .ignore_labels
        .iter()
        .any(|ignored| issue.has_label(ignored))
}

// ---------------------------------------------------------------------------
// Sweep entry point
// ---------------------------------------------------------------------------

pub fn evaluate_staleness(ctx: &StalenessContext<'_>) -> Vec<Action> {
    let cfg = ctx.config;
    let issue_ref = ctx.issue_ref();

    if is_ignored(ctx.issue, cfg) {
        debug!(issue = %issue_ref, "issue carries an ignored label");
        return Vec::new();
    }

    let needs_info = ctx.issue.has_label(&cfg.label_needs_info);
    let stale = ctx.issue.has_label(&cfg.label_stale);
    if !needs_info && !stale {
        return Vec::new();
    }

    let mut actions = Vec::new();
    if needs_info {
        actions.extend(needs_info_branch(ctx, &issue_ref));
    }
    if stale {
        actions.extend(stale_branch(ctx, &issue_ref));
    }
    dedup_actions(actions)
}

fn needs_info_branch(ctx: &StalenessContext<'_>, issue_ref: &IssueRef) -> Vec<Action> {
    let cfg = ctx.config;
    let author = ctx.issue.author();
    let threshold = i64::from(cfg.needs_info_days);

    let last_collaborator = ctx.last_comment_by(|c| ctx.collaborators.contains(c.author()));
    let last_author = ctx.last_comment_by(|c| c.author() == author);

    let collaborator_expired = last_collaborator
        .map(|c| ctx.days_since(c.created_at) >= threshold)
        .unwrap_or(false);
    let author_expired = last_author
        .map(|c| ctx.days_since(c.created_at) >= threshold)
        .unwrap_or(false);

    if !(collaborator_expired || author_expired) {
        return Vec::new();
    }

    let reason = format!("no update in {} days", cfg.needs_info_days);
    vec![
        Action::remove_label(issue_ref, &cfg.label_needs_info, reason.clone()),
        Action::add_label(issue_ref, &cfg.label_stale, reason.clone()),
        Action::comment(
            issue_ref,
            messages::mark_stale(author, cfg.needs_info_days, cfg.stale_days),
            reason,
        ),
    ]
}

fn stale_branch(ctx: &StalenessContext<'_>, issue_ref: &IssueRef) -> Vec<Action> {
    let cfg = ctx.config;
    let Some(marked) = ctx.last_comment_by(|c| c.body.contains(MARK_STALE_MARKER)) else {
        warn!(issue = %issue_ref, "issue is labeled stale but has no mark-stale comment");
        return Vec::new();
    };

    let age = ctx.days_since(marked.created_at);
    if age < i64::from(cfg.stale_days) {
        return Vec::new();
    }

    let reason = format!("stale for {age} days");
    vec![
        Action::comment(
            issue_ref,
            messages::close_stale(ctx.issue.author()),
            reason.clone(),
        ),
        Action::close(issue_ref, reason),
    ]
}

// ---------------------------------------------------------------------------
// New-comment entry point
// ---------------------------------------------------------------------------

/// The bot's own lifecycle comments, recognized by their hidden markers
/// regardless of which account posted them.
fn is_bot_message(comment: &Comment) -> bool {
    comment.body.contains(MARK_STALE_MARKER) || comment.body.contains(CLOSE_STALE_MARKER)
}

/// Transitions triggered by a newly created comment.
pub fn on_comment_created(config: &BotConfig, org: &str, repo: &str, issue: &Issue, comment: &Comment) -> Vec<Action> {
    let Some(cfg) = config.cleanup_config(org, repo) else {
        return Vec::new();
    };
    let issue_ref = IssueRef::new(org, repo, issue.number);

    if issue.state == IssueState::Closed {
        return Vec::new();
    }
    if comment.user.is_bot() || config.is_bot_login(comment.author()) || is_bot_message(comment) {
        debug!(issue = %issue_ref, "ignoring bot comment");
        return Vec::new();
    }
    if is_ignored(issue, cfg) {
        return Vec::new();
    }

    let by_author = comment.author() == issue.author();
    let mut actions = Vec::new();

    if issue.has_label(&cfg.label_stale) {
        let reason = format!("@{} commented on a stale issue", comment.author());
        actions.push(Action::remove_label(&issue_ref, &cfg.label_stale, reason.clone()));
        if by_author {
            if let Some(attention) = &cfg.label_needs_attention {
                actions.push(Action::add_label(&issue_ref, attention, reason));
            }
        } else {
            actions.push(Action::add_label(&issue_ref, &cfg.label_needs_info, reason));
        }
    }

    if by_author && issue.has_label(&cfg.label_needs_info) {
        let reason = "author responded".to_string();
        actions.push(Action::remove_label(&issue_ref, &cfg.label_needs_info, reason.clone()));
        if let Some(attention) = &cfg.label_needs_attention {
            actions.push(Action::add_label(&issue_ref, attention, reason));
        }
    }

    dedup_actions(actions)
}
