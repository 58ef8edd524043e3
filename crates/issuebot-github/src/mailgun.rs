//! Mailgun delivery for label-routing notifications.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use issuebot_core::github::{Mailer, StyledEmail};
use reqwest::Url;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_MAILGUN_URL: &str = "https://api.mailgun.net";

#[derive(Debug, Clone)]
pub struct MailgunClient {
    http: reqwest::Client,
    base_url: String,
    domain: String,
    api_key: String,
    from: String,
}

impl MailgunClient {
    pub fn new(domain: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_MAILGUN_URL, domain, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        domain: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let domain = domain.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            from: format!("issuebot <issuebot@{domain}>"),
            domain,
            api_key: api_key.into(),
        })
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    fn messages_url(&self) -> Result<Url> {
        let raw = format!("{}/v3/{}/messages", self.base_url, self.domain);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }

    async fn send(&self, email: &StyledEmail) -> Result<()> {
        let html = render_html(email);
        let form = [
            ("from", self.from.as_str()),
            ("to", email.recipient.as_str()),
            ("subject", email.subject.as_str()),
            ("html", html.as_str()),
        ];
        let resp = self
            .http
            .post(self.messages_url()?)
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let url = resp.url().to_string();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                method: "POST",
                url,
                status: status.as_u16(),
                body,
            });
        }
        info!(recipient = %email.recipient, subject = %email.subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for MailgunClient {
    async fn send_styled_email(&self, email: &StyledEmail) -> issuebot_core::Result<()> {
        Ok(self.send(email).await?)
    }
}

/// Header, body and a single call-to-action link.
pub fn render_html(email: &StyledEmail) -> String {
    format!(
        "<html><body style=\"font-family:sans-serif\">\
         <h2>{header}</h2>\
         {body}\
         <p><a href=\"{link}\" style=\"display:inline-block;padding:8px 16px;\
         background:#24292f;color:#fff;border-radius:6px;text-decoration:none\">{label}</a></p>\
         </body></html>",
        header = email.header,
        body = email.body_html,
        link = email.link,
        label = email.action_label,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_contains_header_body_and_link() {
        let email = StyledEmail {
            recipient: "team@example.com".into(),
            subject: "s".into(),
            header: "New issue labeled 'bug'".into(),
            body_html: "<p>Crash</p>".into(),
            link: "https://github.com/acme/sdk/issues/1".into(),
            action_label: "Open Issue".into(),
        };
        let html = render_html(&email);
        assert!(html.contains("<h2>New issue labeled 'bug'</h2>"));
        assert!(html.contains("<p>Crash</p>"));
        assert!(html.contains("href=\"https://github.com/acme/sdk/issues/1\""));
        assert!(html.contains(">Open Issue</a>"));
    }

    #[test]
    fn default_sender_uses_domain() {
        let client = MailgunClient::new("mg.example.com", "key").unwrap();
        assert_eq!(client.from, "issuebot <issuebot@mg.example.com>");
        assert_eq!(
            client.messages_url().unwrap().as_str(),
            "https://api.mailgun.net/v3/mg.example.com/messages"
        );
    }
}
