pub mod check_template;
pub mod config;
pub mod serve;
pub mod sweep;

use anyhow::Context;
use issuebot_core::config::BotConfig;
use issuebot_github::GitHubClient;
use std::path::Path;

use crate::GitHubArgs;

pub fn load_config(path: &Path) -> anyhow::Result<BotConfig> {
    BotConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

pub fn github_client(args: &GitHubArgs) -> anyhow::Result<GitHubClient> {
    if args.github_token.is_none() {
        tracing::warn!("no GitHub token set; requests are unauthenticated and rate limited");
    }
    GitHubClient::with_base_url(&args.github_url, args.github_token.clone())
        .context("failed to build GitHub client")
}
