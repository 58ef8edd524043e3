use issuebot_core::config::BotConfig;
use issuebot_core::dispatch::{AuditLog, AuditRecord, Dispatcher};
use issuebot_core::github::GitHubReader;
use std::sync::Arc;
use tracing::warn;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub reader: Arc<dyn GitHubReader>,
    pub dispatcher: Dispatcher,
    /// Shared secret for `X-Hub-Signature-256`. `None` disables verification.
    pub webhook_secret: Option<String>,
    /// Bearer token guarding `/cron/*`. `None` leaves it open.
    pub cron_token: Option<String>,
    pub audit_log: Option<AuditLog>,
}

impl AppState {
    pub fn new(config: BotConfig, reader: Arc<dyn GitHubReader>, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            reader,
            dispatcher,
            webhook_secret: None,
            cron_token: None,
            audit_log: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_cron_token(mut self, token: Option<String>) -> Self {
        self.cron_token = token.filter(|s| !s.is_empty());
        self
    }

    pub fn with_audit_log(mut self, log: Option<AuditLog>) -> Self {
        self.audit_log = log;
        self
    }

    /// Persist audit records; a failed write is logged, never surfaced.
    pub fn record(&self, records: &[AuditRecord]) {
        if let Some(log) = &self.audit_log {
            if let Err(e) = log.append(records) {
                warn!(path = %log.path().display(), error = %e, "failed to write audit log");
            }
        }
    }
}
