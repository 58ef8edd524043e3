use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("invalid regex for label '{label}': {source}")]
    InvalidRegex {
        label: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    #[error("no mailer configured: cannot send email to {0}")]
    MissingMailer(String),

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// True for failures of an external collaborator (GitHub, Mailgun), as
    /// opposed to local configuration or data problems.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            BotError::NotFound(_) | BotError::Auth(_) | BotError::Upstream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
