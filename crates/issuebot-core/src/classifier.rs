//! Decides what happens to a newly opened issue.
//!
//! Order of precedence:
//! 1. transferred issues are left alone
//! 2. a title starting with `FR` marks a feature request
//! 3. otherwise the config resolver picks a label, or the issue needs triage
//! 4. issues filed by collaborators keep their label but nothing else
//! 5. issues without a label are checked against the repo's issue template

use crate::action::{Action, IssueRef};
use crate::config::{BotConfig, LabelLookup, LabelMatch};
use crate::github::GitHubReader;
use crate::messages;
use crate::template::{Template, TemplateCheck};
use crate::types::{Issue, IssueLike};
use serde::Serialize;
use tracing::{debug, warn};

pub const FEATURE_REQUEST_PREFIX: &str = "FR";

// ---------------------------------------------------------------------------
// Classification (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub issue: IssueRef,
    pub transferred: bool,
    pub feature_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelMatch>,
    pub needs_triage: bool,
    pub collaborator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateCheck>,
    pub actions: Vec<Action>,
}

impl Classification {
    fn new(issue: IssueRef) -> Self {
        Self {
            issue,
            transferred: false,
            feature_request: false,
            label: None,
            needs_triage: false,
            collaborator: false,
            template: None,
            actions: Vec::new(),
        }
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

pub fn is_feature_request(title: &str) -> bool {
    title.starts_with(FEATURE_REQUEST_PREFIX)
}

// ---------------------------------------------------------------------------
// classify_new_issue
// ---------------------------------------------------------------------------

pub async fn classify_new_issue<I>(
    config: &BotConfig,
    reader: &dyn GitHubReader,
    org: &str,
    repo: &str,
    issue: &I,
    transferred: bool,
) -> Classification
where
    I: IssueLike + Sync + ?Sized,
{
    let issue_ref = IssueRef::new(org, repo, issue.number());
    let mut out = Classification::new(issue_ref.clone());

    if transferred {
        debug!(issue = %issue_ref, "transferred issue, skipping classification");
        out.transferred = true;
        return out;
    }
    if config.repo_config(org, repo).is_none() {
        debug!(issue = %issue_ref, "repo not configured, skipping classification");
        return out;
    }

    let mut label_actions = Vec::new();
    let mut triage_actions = Vec::new();

    if is_feature_request(issue.title()) {
        out.feature_request = true;
        label_actions.push(Action::add_label(
            &issue_ref,
            &config.settings.feature_request_label,
            "title marks a feature request",
        ));
    } else {
        match config.relevant_label(org, repo, issue) {
            LabelLookup::Matched(m) => {
                let reason = match &m.matched_regex {
                    Some(re) => format!("body matched regex /{re}/"),
                    None => "issue already carries a configured label".to_string(),
                };
                label_actions.push(Action::add_label(&issue_ref, &m.label, reason));
                out.label = Some(m);
            }
            LabelLookup::NoMatch => out.needs_triage = true,
            LabelLookup::NotConfigured => {}
        }
    }

    if out.needs_triage {
        triage_actions.push(Action::add_label(
            &issue_ref,
            &config.settings.needs_triage_label,
            "no configured label matched",
        ));
        triage_actions.push(Action::comment(
            &issue_ref,
            messages::needs_triage(),
            "no configured label matched",
        ));
    }

    match reader.fetch_collaborators(org, repo).await {
        Ok(collaborators) if collaborators.contains(issue.author()) => {
            out.collaborator = true;
            out.actions = label_actions;
            out.actions.push(Action::no_op(
                &issue_ref,
                format!("filed by collaborator @{}, no further action", issue.author()),
            ));
            return out;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(issue = %issue_ref, error = %e, "could not fetch collaborators, treating author as external");
        }
    }

    out.actions = label_actions;
    out.actions.extend(triage_actions);

    let should_validate_template = !(out.feature_request || out.label.is_some());
    if should_validate_template {
        let (check, actions) = validate_template(config, reader, &issue_ref, issue.body()).await;
        out.template = Some(check);
        out.actions.extend(actions);
    }

    out
}

async fn validate_template(
    config: &BotConfig,
    reader: &dyn GitHubReader,
    issue_ref: &IssueRef,
    body: &str,
) -> (TemplateCheck, Vec<Action>) {
    let (org, repo) = (issue_ref.org.as_str(), issue_ref.repo.as_str());
    let Some(path) = config.template_path(org, repo, "issue") else {
        return (TemplateCheck::Matches, Vec::new());
    };
    let validation = config.template_validation_config(org, repo, &path);

    let check = match reader.fetch_issue_template(org, repo, &path).await {
        Ok(text) => {
            let template = Template::parse(&text, config.settings.template.clone());
            if template.document().is_empty() {
                TemplateCheck::OtherError {
                    reason: format!("template {path} has no sections"),
                }
            } else {
                let policy = validation.map(|v| v.policy()).unwrap_or_default();
                TemplateCheck::evaluate(&template, body, policy)
            }
        }
        Err(e) => TemplateCheck::OtherError {
            reason: format!("could not fetch template {path}: {e}"),
        },
    };

    let mut actions = Vec::new();
    match &check {
        TemplateCheck::Matches => {}
        TemplateCheck::MissingSections { sections } => {
            actions.push(Action::comment(
                issue_ref,
                messages::follow_template(sections),
                format!("missing template sections in {path}"),
            ));
        }
        TemplateCheck::EmptyRequiredSections { sections } => {
            actions.push(Action::comment(
                issue_ref,
                messages::missing_info(sections),
                format!("required sections of {path} left empty"),
            ));
        }
        TemplateCheck::OtherError { reason } => {
            warn!(issue = %issue_ref, %reason, "template validation skipped");
            actions.push(Action::comment(
                issue_ref,
                messages::template_error(),
                reason.clone(),
            ));
            // Fail open: the issue is not marked as failing validation.
            return (check, actions);
        }
    }

    if !check.matches() {
        if let Some(label) = validation.and_then(|v| v.validation_failed_label.as_ref()) {
            actions.push(Action::add_label(
                issue_ref,
                label,
                format!("issue does not match {path}"),
            ));
        }
    }
    (check, actions)
}

// ---------------------------------------------------------------------------
// route_labeled_issue
// ---------------------------------------------------------------------------

/// Notify the owning team when an issue receives a label that has an email
/// address configured.
pub fn route_labeled_issue(config: &BotConfig, org: &str, repo: &str, issue: &Issue, label: &str) -> Vec<Action> {
    let Some(recipient) = config.label_email(org, repo, label) else {
        return Vec::new();
    };
    let link = issue
        .html_url
        .clone()
        .unwrap_or_else(|| format!("https://github.com/{org}/{repo}/issues/{}", issue.number));
    vec![Action::SendEmail {
        recipient: recipient.to_string(),
        subject: messages::label_email_subject(org, repo, issue.number, &issue.title),
        header: messages::label_email_header(label),
        body: format!("{}\n\n{}", issue.title, issue.body()),
        link,
        action_label: "Open Issue".to_string(),
        reason: Some(format!("label '{label}' routes to {recipient}")),
    }]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use crate::testing::FakeGitHub;
    use crate::types::{IssueState, Label, User};
    use chrono::Utc;

    const TEMPLATE: &str = "\
### [REQUIRED] Environment
OS: ___

### [REQUIRED] Problem
Describe the problem.

### [REQUIRED] Steps
1. ...
";

    const CONFIG: &str = r#"
repos:
  acme:
    sdk:
      labels:
        "api: storage":
          regex: "(?i)storage"
          email: storage@example.com
        "api: auth":
          regex: "(?i)\\bauth\\b"
      templates:
        issue: .github/ISSUE_TEMPLATE/bug.md
      validation:
        templates:
          .github/ISSUE_TEMPLATE/bug.md:
            validation_failed_label: needs-template
            required_section_validation: strict
    relaxed:
      labels:
        "api: storage":
          regex: "(?i)storage"
      validation:
        templates:
          ISSUE_TEMPLATE.md:
            required_section_validation: relaxed
"#;

    fn config() -> BotConfig {
        BotConfig::from_yaml(CONFIG).unwrap()
    }

    fn github() -> FakeGitHub {
        FakeGitHub::new()
            .with_template(".github/ISSUE_TEMPLATE/bug.md", TEMPLATE)
            .with_template("ISSUE_TEMPLATE.md", TEMPLATE)
            .with_collaborator("maintainer")
    }

    fn issue(title: &str, body: &str, author: &str) -> Issue {
        Issue {
            number: 42,
            title: title.into(),
            body: Some(body.into()),
            user: User::new(author),
            labels: vec![],
            state: IssueState::Open,
            html_url: None,
            created_at: Utc::now(),
        }
    }

    fn kinds(actions: &[Action]) -> Vec<ActionType> {
        actions.iter().map(Action::kind).collect()
    }

    fn added_labels(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::AddLabel { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn feature_request_skips_template_validation() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("FR: thing", "", "alice"), false).await;
        assert!(c.feature_request);
        assert!(c.template.is_none());
        assert_eq!(added_labels(&c.actions), vec!["feature-request"]);
        assert_eq!(kinds(&c.actions), vec![ActionType::AddLabel]);
    }

    #[tokio::test]
    async fn feature_request_prefix_is_case_sensitive() {
        assert!(is_feature_request("FR: add X"));
        assert!(!is_feature_request("fr: add X"));
        assert!(!is_feature_request("Feature: add X"));
    }

    #[tokio::test]
    async fn matched_label_skips_template_validation() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Upload", "storage fails", "alice"), false).await;
        assert_eq!(added_labels(&c.actions), vec!["api: storage"]);
        assert!(!c.needs_triage);
        assert!(c.template.is_none());
        assert!(c.actions[0].reason().unwrap().contains("(?i)storage"));
    }

    #[tokio::test]
    async fn unmatched_issue_needs_triage_and_template_check() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", "it crashed", "alice"), false).await;
        assert!(c.needs_triage);
        assert_eq!(
            c.template,
            Some(TemplateCheck::MissingSections {
                sections: vec!["environment".into(), "problem".into(), "steps".into()]
            })
        );
        assert_eq!(
            kinds(&c.actions),
            vec![
                ActionType::AddLabel,
                ActionType::Comment,
                ActionType::Comment,
                ActionType::AddLabel
            ]
        );
        assert_eq!(added_labels(&c.actions), vec!["needs-triage", "needs-template"]);
    }

    #[tokio::test]
    async fn unedited_template_reports_missing_info() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", TEMPLATE, "alice"), false).await;
        assert!(matches!(c.template, Some(TemplateCheck::EmptyRequiredSections { ref sections }) if sections.len() == 3));
        let comment = c
            .actions
            .iter()
            .find_map(|a| match a {
                Action::Comment { message, .. } if message.contains("missing some required") => Some(message),
                _ => None,
            });
        assert!(comment.is_some());
    }

    #[tokio::test]
    async fn relaxed_policy_accepts_partially_filled_template() {
        let gh = github();
        let body = TEMPLATE.replace("OS: ___", "OS: Android 14");
        let c = classify_new_issue(&config(), &gh, "acme", "relaxed", &issue("Crash", &body, "alice"), false).await;
        assert_eq!(c.template, Some(TemplateCheck::Matches));
        assert_eq!(added_labels(&c.actions), vec!["needs-triage"]);
    }

    #[tokio::test]
    async fn collaborator_issue_gets_exactly_one_noop() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", "", "maintainer"), false).await;
        assert!(c.collaborator);
        assert_eq!(kinds(&c.actions), vec![ActionType::NoOp]);
        assert!(c.template.is_none());
    }

    #[tokio::test]
    async fn collaborator_issue_keeps_initial_label() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Upload", "storage", "maintainer"), false).await;
        assert_eq!(kinds(&c.actions), vec![ActionType::AddLabel, ActionType::NoOp]);
    }

    #[tokio::test]
    async fn collaborator_fetch_failure_treats_author_as_external() {
        let mut gh = github();
        gh.collaborators_fail = true;
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", "", "maintainer"), false).await;
        assert!(!c.collaborator);
        assert!(c.needs_triage);
    }

    #[tokio::test]
    async fn transferred_issue_is_left_alone() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", "", "alice"), true).await;
        assert!(c.transferred);
        assert!(c.actions.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_repo_produces_no_actions() {
        let gh = github();
        let c = classify_new_issue(&config(), &gh, "acme", "elsewhere", &issue("FR: x", "", "alice"), false).await;
        assert!(c.actions.is_empty());
    }

    #[tokio::test]
    async fn template_fetch_failure_fails_open() {
        let gh = FakeGitHub::new();
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &issue("Crash", "", "alice"), false).await;
        assert!(matches!(c.template, Some(TemplateCheck::OtherError { .. })));
        assert_eq!(added_labels(&c.actions), vec!["needs-triage"]);
        let last = c.actions.last().unwrap();
        assert!(matches!(last, Action::Comment { message, .. } if message.contains("wasn't able to check")));
    }

    #[tokio::test]
    async fn classification_is_idempotent() {
        let gh = github();
        let cfg = config();
        let i = issue("Crash", "it crashed", "alice");
        let first = classify_new_issue(&cfg, &gh, "acme", "sdk", &i, false).await;
        let second = classify_new_issue(&cfg, &gh, "acme", "sdk", &i, false).await;
        assert_eq!(first.actions, second.actions);
    }

    #[tokio::test]
    async fn existing_label_counts_as_match() {
        let gh = github();
        let mut i = issue("Crash", "", "alice");
        i.labels.push(Label::new("api: auth"));
        let c = classify_new_issue(&config(), &gh, "acme", "sdk", &i, false).await;
        assert!(!c.needs_triage);
        assert!(c.template.is_none());
        assert_eq!(added_labels(&c.actions), vec!["api: auth"]);
    }

    #[test]
    fn labeled_issue_with_email_routes_notification() {
        let i = issue("Upload broken", "storage fails", "alice");
        let actions = route_labeled_issue(&config(), "acme", "sdk", &i, "api: storage");
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::SendEmail {
                recipient,
                subject,
                link,
                ..
            } => {
                assert_eq!(recipient, "storage@example.com");
                assert!(subject.contains("acme/sdk"));
                assert_eq!(link, "https://github.com/acme/sdk/issues/42");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(route_labeled_issue(&config(), "acme", "sdk", &i, "api: auth").is_empty());
    }
}
