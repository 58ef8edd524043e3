use anyhow::Context;
use issuebot_core::config::WarnLevel;
use issuebot_core::dispatch::{AuditLog, Dispatcher};
use issuebot_github::MailgunClient;
use issuebot_server::AppState;
use std::path::PathBuf;
use std::sync::Arc;

use crate::GitHubArgs;

pub struct ServeOptions {
    pub config: PathBuf,
    pub addr: String,
    pub github: GitHubArgs,
    pub webhook_secret: Option<String>,
    pub cron_token: Option<String>,
    /// (domain, api key)
    pub mailgun: Option<(String, String)>,
    pub audit_log: Option<PathBuf>,
}

pub fn run(opts: ServeOptions) -> anyhow::Result<()> {
    let config = super::load_config(&opts.config)?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
        }
    }

    let github = Arc::new(super::github_client(&opts.github)?);
    let mut dispatcher = Dispatcher::new(github.clone());
    match opts.mailgun {
        Some((domain, key)) => {
            let mailer = MailgunClient::new(domain, key).context("failed to build Mailgun client")?;
            dispatcher = dispatcher.with_mailer(Arc::new(mailer));
        }
        None => tracing::warn!("Mailgun not configured; label-routing email is disabled"),
    }
    if opts.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set; webhook signatures are not verified");
    }

    let state = AppState::new(config, github, dispatcher)
        .with_webhook_secret(opts.webhook_secret)
        .with_cron_token(opts.cron_token)
        .with_audit_log(opts.audit_log.map(AuditLog::new));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&opts.addr)
            .await
            .with_context(|| format!("failed to bind {}", opts.addr))?;
        tokio::select! {
            res = issuebot_server::serve_on(state, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
