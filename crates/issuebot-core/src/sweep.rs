//! Periodic staleness sweep over a repo's open issues.

use crate::action::Action;
use crate::config::{BotConfig, IssueCleanupConfig};
use crate::error::Result;
use crate::github::GitHubReader;
use crate::staleness::{evaluate_staleness, is_ignored, StalenessContext};
use crate::types::{sort_newest_first, Issue, IssueLike};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub org: String,
    pub repo: String,
    /// `None` when the whole repo could not be swept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<u64>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub actions: Vec<Action>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.examined += other.examined;
        self.actions.extend(other.actions);
        self.failures.extend(other.failures);
    }
}

/// True when the issue is in a state the sweep may act on.
fn needs_evaluation(issue: &Issue, cfg: &IssueCleanupConfig) -> bool {
    !is_ignored(issue, cfg) && (issue.has_label(&cfg.label_needs_info) || issue.has_label(&cfg.label_stale))
}

/// Sweep one repo. Only fetching the open-issue list can fail the whole
/// repo; a failed comment fetch is recorded against that issue and the
/// sweep moves on.
pub async fn sweep_repo(
    config: &BotConfig,
    reader: Arc<dyn GitHubReader>,
    org: &str,
    repo: &str,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let Some(cleanup) = config.cleanup_config(org, repo).cloned() else {
        return Ok(report);
    };

    let issues: Vec<Issue> = reader
        .fetch_open_issues(org, repo)
        .await?
        .into_iter()
        .filter(|i| needs_evaluation(i, &cleanup))
        .collect();
    report.examined = issues.len();
    if issues.is_empty() {
        return Ok(report);
    }

    let collaborators = match reader.fetch_collaborators(org, repo).await {
        Ok(c) => c,
        Err(e) => {
            warn!(org, repo, error = %e, "could not fetch collaborators, sweeping without them");
            HashSet::new()
        }
    };
    let collaborators = Arc::new(collaborators);
    let cleanup = Arc::new(cleanup);
    let semaphore = Arc::new(Semaphore::new(config.settings.sweep_concurrency.max(1)));
    let delay = Duration::from_millis(config.settings.sweep_delay_ms);

    let mut handles = Vec::with_capacity(issues.len());
    for issue in issues {
        let sem = semaphore.clone();
        let reader = reader.clone();
        let collaborators = collaborators.clone();
        let cleanup = cleanup.clone();
        let (org, repo) = (org.to_string(), repo.to_string());
        let number = issue.number;
        let handle = tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(p) => p,
                Err(_) => return Err("semaphore closed".to_string()),
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut comments = reader
                .fetch_comments(&org, &repo, issue.number)
                .await
                .map_err(|e| e.to_string())?;
            sort_newest_first(&mut comments);
            let ctx = StalenessContext {
                org: &org,
                repo: &repo,
                issue: &issue,
                comments: &comments,
                collaborators: &collaborators,
                config: &cleanup,
                now,
            };
            Ok(evaluate_staleness(&ctx))
        });
        handles.push((number, handle));
    }

    for (number, handle) in handles {
        let result = match handle.await {
            Ok(r) => r,
            Err(e) => Err(format!("task join error: {e}")),
        };
        match result {
            Ok(actions) => report.actions.extend(actions),
            Err(error) => {
                warn!(org, repo, issue = number, %error, "staleness check failed");
                report.failures.push(SweepFailure {
                    org: org.to_string(),
                    repo: repo.to_string(),
                    issue: Some(number),
                    error,
                });
            }
        }
    }

    info!(
        org,
        repo,
        examined = report.examined,
        actions = report.actions.len(),
        failures = report.failures.len(),
        "sweep finished"
    );
    Ok(report)
}

/// Sweep every repo that has issue cleanup configured.
pub async fn sweep_all(config: &BotConfig, reader: Arc<dyn GitHubReader>, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();
    for (org, repo, repo_config) in config.repos() {
        if !repo_config.features().issue_cleanup {
            continue;
        }
        match sweep_repo(config, reader.clone(), org, repo, now).await {
            Ok(r) => report.merge(r),
            Err(e) => {
                warn!(org, repo, error = %e, "repo sweep failed");
                report.failures.push(SweepFailure {
                    org: org.to_string(),
                    repo: repo.to_string(),
                    issue: None,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}
