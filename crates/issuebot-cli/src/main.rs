mod cmd;
mod output;

use clap::{Args, Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use issuebot_core::template::RequiredSectionValidation;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "issuebot",
    about = "GitHub issue bot: labels and validates new issues, and closes stale ones",
    version,
    propagate_version = true
)]
struct Cli {
    /// Bot config file (YAML or JSON)
    #[arg(long, short = 'c', global = true, env = "ISSUEBOT_CONFIG", default_value = "issuebot.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// GitHub API access shared by `serve` and `sweep`.
#[derive(Args, Debug, Clone)]
pub struct GitHubArgs {
    /// GitHub token with issues read/write access
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = issuebot_github::client::DEFAULT_API_URL)]
    pub github_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook and cron HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "ISSUEBOT_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,

        #[command(flatten)]
        github: GitHubArgs,

        /// Secret for verifying X-Hub-Signature-256
        #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,

        /// Bearer token required on /cron/* endpoints
        #[arg(long, env = "CRON_TOKEN", hide_env_values = true)]
        cron_token: Option<String>,

        /// Mailgun sending domain (enables label-routing email)
        #[arg(long, env = "MAILGUN_DOMAIN")]
        mailgun_domain: Option<String>,

        #[arg(long, env = "MAILGUN_API_KEY", hide_env_values = true)]
        mailgun_api_key: Option<String>,

        /// Append an audit record per executed action (JSON lines)
        #[arg(long, env = "ISSUEBOT_AUDIT_LOG")]
        audit_log: Option<PathBuf>,
    },

    /// Run the staleness sweep once
    Sweep {
        /// Only sweep this org
        #[arg(long)]
        org: Option<String>,

        /// Only sweep this repo (requires --org)
        #[arg(long, requires = "org")]
        repo: Option<String>,

        /// Execute the actions instead of printing them
        #[arg(long)]
        apply: bool,

        #[command(flatten)]
        github: GitHubArgs,

        /// Append an audit record per executed action (JSON lines)
        #[arg(long, env = "ISSUEBOT_AUDIT_LOG")]
        audit_log: Option<PathBuf>,
    },

    /// Check an issue body against a template file
    CheckTemplate {
        /// Canonical template (Markdown)
        template: PathBuf,

        /// Issue body to check; `-` reads stdin
        body: PathBuf,

        /// Required-section policy: strict, relaxed or none
        #[arg(long, default_value = "strict")]
        policy: RequiredSectionValidation,
    },

    /// Inspect the bot config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Sweep { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve {
            addr,
            github,
            webhook_secret,
            cron_token,
            mailgun_domain,
            mailgun_api_key,
            audit_log,
        } => cmd::serve::run(cmd::serve::ServeOptions {
            config: cli.config,
            addr,
            github,
            webhook_secret,
            cron_token,
            mailgun: mailgun_domain.zip(mailgun_api_key),
            audit_log,
        }),
        Commands::Sweep {
            org,
            repo,
            apply,
            github,
            audit_log,
        } => cmd::sweep::run(cmd::sweep::SweepOptions {
            config: cli.config,
            org,
            repo,
            apply,
            github,
            audit_log,
            json: cli.json,
        }),
        Commands::CheckTemplate {
            template,
            body,
            policy,
        } => cmd::check_template::run(&cli.config, &template, &body, policy, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
