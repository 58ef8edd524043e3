use anyhow::Context;
use chrono::Utc;
use issuebot_core::config::BotConfig;
use issuebot_core::dispatch::{AuditLog, Dispatcher};
use issuebot_core::github::GitHubReader;
use issuebot_core::sweep::{sweep_all, sweep_repo, SweepReport};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::output::{print_actions, print_json, print_table};
use crate::GitHubArgs;

pub struct SweepOptions {
    pub config: PathBuf,
    pub org: Option<String>,
    pub repo: Option<String>,
    pub apply: bool,
    pub github: GitHubArgs,
    pub audit_log: Option<PathBuf>,
    pub json: bool,
}

pub fn run(opts: SweepOptions) -> anyhow::Result<()> {
    let config = super::load_config(&opts.config)?;
    let github = Arc::new(super::github_client(&opts.github)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let report = collect(&config, github.clone(), opts.org.as_deref(), opts.repo.as_deref()).await?;

        if !opts.apply {
            if opts.json {
                print_json(&report)?;
            } else {
                print_actions(&report.actions);
                print_failures(&report);
            }
            return Ok(());
        }

        let dispatcher = Dispatcher::new(github);
        let records = dispatcher.dispatch_all(report.actions.clone()).await;
        if let Some(path) = opts.audit_log {
            AuditLog::new(path)
                .append(&records)
                .context("failed to write audit log")?;
        }
        let failed = records.iter().filter(|r| r.outcome.is_failure()).count();

        if opts.json {
            print_json(&json!({
                "examined": report.examined,
                "records": records,
                "failures": report.failures,
            }))?;
        } else {
            print_actions(&report.actions);
            print_failures(&report);
            println!("Applied {} action(s), {failed} failed.", records.len() - failed);
        }
        if failed > 0 {
            anyhow::bail!("{failed} action(s) failed");
        }
        Ok(())
    })
}

async fn collect(
    config: &BotConfig,
    reader: Arc<dyn GitHubReader>,
    org: Option<&str>,
    repo: Option<&str>,
) -> anyhow::Result<SweepReport> {
    let now = Utc::now();
    match (org, repo) {
        (Some(org), Some(repo)) => Ok(sweep_repo(config, reader, org, repo, now)
            .await
            .with_context(|| format!("failed to sweep {org}/{repo}"))?),
        (Some(org), None) => {
            let mut report = SweepReport::default();
            let org_key = org.trim().to_lowercase();
            for (o, r, _) in config.repos() {
                if o != org_key {
                    continue;
                }
                let partial = sweep_repo(config, reader.clone(), o, r, now)
                    .await
                    .with_context(|| format!("failed to sweep {o}/{r}"))?;
                report.examined += partial.examined;
                report.actions.extend(partial.actions);
                report.failures.extend(partial.failures);
            }
            Ok(report)
        }
        _ => Ok(sweep_all(config, reader, now).await),
    }
}

fn print_failures(report: &SweepReport) {
    if report.failures.is_empty() {
        return;
    }
    println!();
    let rows: Vec<Vec<String>> = report
        .failures
        .iter()
        .map(|f| {
            vec![
                format!("{}/{}", f.org, f.repo),
                f.issue.map(|n| format!("#{n}")).unwrap_or_else(|| "-".into()),
                f.error.clone(),
            ]
        })
        .collect();
    print_table(&["REPO", "ISSUE", "ERROR"], &rows);
}
