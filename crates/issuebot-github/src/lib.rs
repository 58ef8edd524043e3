//! Concrete collaborators for `issuebot-core`: a GitHub REST client and a
//! Mailgun mailer.

pub mod client;
pub mod error;
pub mod mailgun;

pub use client::GitHubClient;
pub use error::ClientError;
pub use mailgun::MailgunClient;
