use anyhow::Context;
use issuebot_core::config::BotConfig;
use issuebot_core::template::{RequiredSectionValidation, Template, TemplateCheck, TemplateOptions};
use serde_json::json;
use std::io::Read;
use std::path::Path;

use crate::output::print_json;

pub fn run(
    config: &Path,
    template: &Path,
    body: &Path,
    policy: RequiredSectionValidation,
    json: bool,
) -> anyhow::Result<()> {
    let opts = template_options(config)?;
    let template_text = std::fs::read_to_string(template)
        .with_context(|| format!("failed to read template {}", template.display()))?;
    let body_text = read_body(body)?;

    let parsed = Template::parse(&template_text, opts);
    if parsed.document().is_empty() {
        anyhow::bail!("template {} has no sections", template.display());
    }
    let check = TemplateCheck::evaluate(&parsed, &body_text, policy);

    if json {
        print_json(&json!({ "policy": policy, "result": check }))?;
    } else {
        match &check {
            TemplateCheck::Matches => println!("Issue matches the template ({policy})."),
            TemplateCheck::MissingSections { sections } => {
                println!("Missing sections:");
                for s in sections {
                    println!("  - {s}");
                }
            }
            TemplateCheck::EmptyRequiredSections { sections } => {
                println!("Required sections left unchanged ({policy}):");
                for s in sections {
                    println!("  - {s}");
                }
            }
            TemplateCheck::OtherError { reason } => println!("Could not check: {reason}"),
        }
    }

    if !check.matches() {
        anyhow::bail!("issue does not match the template");
    }
    Ok(())
}

/// Section markers come from the config when one exists; otherwise the
/// defaults apply.
fn template_options(config: &Path) -> anyhow::Result<TemplateOptions> {
    if !config.exists() {
        return Ok(TemplateOptions::default());
    }
    let config = BotConfig::load(config)
        .with_context(|| format!("failed to load config {}", config.display()))?;
    Ok(config.settings.template)
}

fn read_body(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read issue body from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
