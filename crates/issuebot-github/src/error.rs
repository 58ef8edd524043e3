use issuebot_core::BotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for BotError {
    fn from(e: ClientError) -> Self {
        match e.status() {
            Some(404) => BotError::NotFound(e.to_string()),
            Some(401) | Some(403) => BotError::Auth(e.to_string()),
            _ => BotError::Upstream(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status {
            method: "GET",
            url: "https://api.github.com/x".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn status_codes_map_to_core_errors() {
        assert!(matches!(BotError::from(status(404)), BotError::NotFound(_)));
        assert!(matches!(BotError::from(status(401)), BotError::Auth(_)));
        assert!(matches!(BotError::from(status(403)), BotError::Auth(_)));
        assert!(matches!(BotError::from(status(502)), BotError::Upstream(_)));
    }
}
