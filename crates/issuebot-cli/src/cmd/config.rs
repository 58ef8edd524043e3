use anyhow::Context;
use clap::Subcommand;
use issuebot_core::config::{BotConfig, WarnLevel};
use serde_json::json;
use std::path::Path;

use crate::output::{print_json, print_table};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate,

    /// List configured repos and their enabled features
    Show,
}

pub fn run(path: &Path, subcommand: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = BotConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))?;
    match subcommand {
        ConfigSubcommand::Validate => validate(&config, json),
        ConfigSubcommand::Show => show(&config, json),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &BotConfig, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &BotConfig, json: bool) -> anyhow::Result<()> {
    let repos = config.repos();

    if json {
        let value: Vec<_> = repos
            .iter()
            .map(|(org, repo, c)| {
                json!({
                    "org": org,
                    "repo": repo,
                    "labels": c.labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
                    "features": c.features(),
                })
            })
            .collect();
        return print_json(&json!({ "settings": config.settings, "repos": value }));
    }

    if repos.is_empty() {
        println!("No repos configured.");
        return Ok(());
    }
    let yes_no = |b: bool| (if b { "yes" } else { "no" }).to_string();
    let rows: Vec<Vec<String>> = repos
        .iter()
        .map(|(org, repo, c)| {
            let f = c.features();
            vec![
                format!("{org}/{repo}"),
                c.labels.len().to_string(),
                yes_no(f.issue_labels),
                yes_no(f.template_validation),
                yes_no(f.issue_cleanup),
            ]
        })
        .collect();
    print_table(&["REPO", "LABELS", "LABELING", "TEMPLATES", "CLEANUP"], &rows);
    Ok(())
}
