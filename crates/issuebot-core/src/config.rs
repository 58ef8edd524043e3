use crate::error::{BotError, Result};
use crate::template::{RequiredSectionValidation, TemplateOptions};
use crate::types::IssueLike;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

pub const DEFAULT_ISSUE_TEMPLATE: &str = "ISSUE_TEMPLATE.md";
pub const DEFAULT_PULL_REQUEST_TEMPLATE: &str = "PULL_REQUEST_TEMPLATE.md";

/// Canonical form for every org, repo, label and template key.
pub fn sanitize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LabelRule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelRule {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl LabelRule {
    pub fn new(name: impl Into<String>, regex: Option<&str>, email: Option<&str>) -> Result<Self> {
        let mut rule = Self {
            name: name.into(),
            regex: regex.map(str::to_string),
            email: email.map(str::to_string),
            compiled: None,
        };
        rule.compile()?;
        Ok(rule)
    }

    fn compile(&mut self) -> Result<()> {
        self.compiled = match &self.regex {
            Some(pattern) => Some(Regex::new(pattern).map_err(|source| {
                BotError::InvalidRegex {
                    label: self.name.clone(),
                    source,
                }
            })?),
            None => None,
        };
        Ok(())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.compiled
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

/// Labels are written as a mapping of label name to rule, but "first match
/// wins" needs their declared order, so they are kept as a sequence.
mod ordered_labels {
    use super::*;

    pub fn serialize<S: Serializer>(labels: &[LabelRule], s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(labels.len()))?;
        for rule in labels {
            map.serialize_entry(&rule.name, rule)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<LabelRule>, D::Error> {
        struct LabelsVisitor;

        impl<'de> Visitor<'de> for LabelsVisitor {
            type Value = Vec<LabelRule>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of label name to label rule")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut labels = Vec::new();
                while let Some((name, mut rule)) = access.next_entry::<String, LabelRule>()? {
                    rule.name = name;
                    labels.push(rule);
                }
                Ok(labels)
            }
        }

        d.deserialize_map(LabelsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Cleanup / validation config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCleanupConfig {
    pub label_needs_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_needs_attention: Option<String>,
    pub label_stale: String,
    #[serde(default)]
    pub ignore_labels: BTreeSet<String>,
    pub needs_info_days: u32,
    pub stale_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueCleanupConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateValidationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_failed_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_section_validation: Option<RequiredSectionValidation>,
}

impl TemplateValidationConfig {
    pub fn policy(&self) -> RequiredSectionValidation {
        self.required_section_validation.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub templates: HashMap<String, TemplateValidationConfig>,
}

// ---------------------------------------------------------------------------
// RepoConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default, with = "ordered_labels")]
    pub labels: Vec<LabelRule>,
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepoFeatures {
    pub issue_labels: bool,
    pub issue_cleanup: bool,
    pub template_validation: bool,
}

impl RepoConfig {
    pub fn features(&self) -> RepoFeatures {
        RepoFeatures {
            issue_labels: !self.labels.is_empty(),
            issue_cleanup: self.issue_cleanup().is_some(),
            template_validation: self
                .validation
                .as_ref()
                .map(|v| !v.templates.is_empty())
                .unwrap_or(false),
        }
    }

    pub fn issue_cleanup(&self) -> Option<&IssueCleanupConfig> {
        self.cleanup.as_ref().and_then(|c| c.issue.as_ref())
    }

    pub fn label(&self, name: &str) -> Option<&LabelRule> {
        let key = sanitize_key(name);
        self.labels.iter().find(|l| sanitize_key(&l.name) == key)
    }

    fn normalize(&mut self) -> Result<()> {
        for rule in &mut self.labels {
            rule.compile()?;
        }
        self.templates = std::mem::take(&mut self.templates)
            .into_iter()
            .map(|(kind, path)| (sanitize_key(&kind), path))
            .collect();
        if let Some(validation) = self.validation.as_mut() {
            validation.templates = std::mem::take(&mut validation.templates)
                .into_iter()
                .map(|(path, cfg)| (sanitize_key(&path), cfg))
                .collect();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Label lookup results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelMatch {
    pub label: String,
    /// The regex that matched, or `None` when the issue already carried the
    /// label.
    pub matched_regex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelLookup {
    Matched(LabelMatch),
    /// Labels are configured for the repo but none applies.
    NoMatch,
    /// The repo has no label rules at all.
    NotConfigured,
}

// ---------------------------------------------------------------------------
// BotSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Login the bot comments as; its own comments never trigger transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_login: Option<String>,
    #[serde(default = "default_feature_request_label")]
    pub feature_request_label: String,
    #[serde(default = "default_needs_triage_label")]
    pub needs_triage_label: String,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
    #[serde(default)]
    pub sweep_delay_ms: u64,
    #[serde(default)]
    pub template: TemplateOptions,
}

fn default_feature_request_label() -> String {
    "feature-request".to_string()
}

fn default_needs_triage_label() -> String {
    "needs-triage".to_string()
}

fn default_sweep_concurrency() -> usize {
    4
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            bot_login: None,
            feature_request_label: default_feature_request_label(),
            needs_triage_label: default_needs_triage_label(),
            sweep_concurrency: default_sweep_concurrency(),
            sweep_delay_ms: 0,
            template: TemplateOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// BotConfig (top-level)
// ---------------------------------------------------------------------------

/// Org → repo → rules. Keys are sanitized on construction, so every lookup
/// must go through the accessors below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub settings: BotSettings,
    #[serde(default)]
    repos: HashMap<String, HashMap<String, RepoConfig>>,
}

impl BotConfig {
    pub fn new(settings: BotSettings) -> Self {
        Self {
            settings,
            repos: HashMap::new(),
        }
    }

    /// Register (or replace) a repo's rules.
    pub fn with_repo(mut self, org: &str, repo: &str, mut config: RepoConfig) -> Result<Self> {
        config.normalize()?;
        self.repos
            .entry(sanitize_key(org))
            .or_default()
            .insert(sanitize_key(repo), config);
        Ok(self)
    }

    /// Parse YAML (or JSON) config text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: BotConfig = serde_yaml::from_str(text)?;
        let mut cfg = BotConfig::new(raw.settings);
        for (org, repos) in raw.repos {
            for (repo, config) in repos {
                cfg = cfg.with_repo(&org, &repo, config)?;
            }
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BotError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    /// All configured repos as `(org, repo, config)`, sorted for stable output.
    pub fn repos(&self) -> Vec<(&str, &str, &RepoConfig)> {
        let mut out: Vec<_> = self
            .repos
            .iter()
            .flat_map(|(org, repos)| {
                repos
                    .iter()
                    .map(move |(name, cfg)| (org.as_str(), name.as_str(), cfg))
            })
            .collect();
        out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn repo_config(&self, org: &str, repo: &str) -> Option<&RepoConfig> {
        self.repos
            .get(&sanitize_key(org))
            .and_then(|repos| repos.get(&sanitize_key(repo)))
    }

    /// Pick the label an issue belongs under: an existing label that is
    /// configured wins (in the issue's label order), otherwise the first
    /// configured rule whose regex matches the body.
    pub fn relevant_label<I: IssueLike + ?Sized>(&self, org: &str, repo: &str, issue: &I) -> LabelLookup {
        let Some(config) = self.repo_config(org, repo) else {
            return LabelLookup::NotConfigured;
        };
        if !config.features().issue_labels {
            return LabelLookup::NotConfigured;
        }

        for existing in issue.labels() {
            if config.label(&existing.name).is_some() {
                return LabelLookup::Matched(LabelMatch {
                    label: existing.name.clone(),
                    matched_regex: None,
                });
            }
        }

        let body = issue.body();
        config
            .labels
            .iter()
            .find(|rule| rule.matches(body))
            .map(|rule| {
                LabelLookup::Matched(LabelMatch {
                    label: rule.name.clone(),
                    matched_regex: rule.regex.clone(),
                })
            })
            .unwrap_or(LabelLookup::NoMatch)
    }

    /// Configured template path for a template kind, falling back to the
    /// conventional default for `issue` and `pull_request`.
    pub fn template_path(&self, org: &str, repo: &str, kind: &str) -> Option<String> {
        let kind = sanitize_key(kind);
        if let Some(path) = self
            .repo_config(org, repo)
            .and_then(|c| c.templates.get(&kind))
        {
            return Some(path.clone());
        }
        match kind.as_str() {
            "issue" => Some(DEFAULT_ISSUE_TEMPLATE.to_string()),
            "pull_request" => Some(DEFAULT_PULL_REQUEST_TEMPLATE.to_string()),
            _ => None,
        }
    }

    /// Validation settings for a template path. `None` means default
    /// (strict, no failure label).
    pub fn template_validation_config(
        &self,
        org: &str,
        repo: &str,
        template_path: &str,
    ) -> Option<&TemplateValidationConfig> {
        self.repo_config(org, repo)
            .and_then(|c| c.validation.as_ref())
            .and_then(|v| v.templates.get(&sanitize_key(template_path)))
    }

    pub fn cleanup_config(&self, org: &str, repo: &str) -> Option<&IssueCleanupConfig> {
        self.repo_config(org, repo).and_then(|c| c.issue_cleanup())
    }

    pub fn label_email(&self, org: &str, repo: &str, label: &str) -> Option<&str> {
        self.repo_config(org, repo)
            .and_then(|c| c.label(label))
            .and_then(|rule| rule.email.as_deref())
    }

    /// True when `login` is the bot itself.
    pub fn is_bot_login(&self, login: &str) -> bool {
        self.settings
            .bot_login
            .as_deref()
            .map(|b| b.eq_ignore_ascii_case(login))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.settings.sweep_concurrency == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "settings.sweep_concurrency must be at least 1".to_string(),
            });
        }

        for (org, repo, config) in self.repos() {
            let features = config.features();
            if !features.issue_labels && !features.issue_cleanup && !features.template_validation {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{org}/{repo} has no labels, cleanup or validation configured"),
                });
            }

            for rule in &config.labels {
                if let Some(email) = &rule.email {
                    if !email.contains('@') {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Warning,
                            message: format!(
                                "{org}/{repo} label '{}' has an invalid email '{email}'",
                                rule.name
                            ),
                        });
                    }
                }
            }

            if let Some(cleanup) = config.issue_cleanup() {
                if self.settings.bot_login.is_none() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "{org}/{repo} has issue cleanup but settings.bot_login is unset; \
                             the bot would react to its own comments"
                        ),
                    });
                }
                if sanitize_key(&cleanup.label_needs_info) == sanitize_key(&cleanup.label_stale) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "{org}/{repo} uses '{}' for both needs-info and stale",
                            cleanup.label_stale
                        ),
                    });
                }
                for state_label in [&cleanup.label_needs_info, &cleanup.label_stale] {
                    let state_key = sanitize_key(state_label);
                    if cleanup.ignore_labels.iter().any(|l| sanitize_key(l) == state_key) {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Warning,
                            message: format!(
                                "{org}/{repo} ignores its own cleanup label '{state_label}'"
                            ),
                        });
                    }
                }
                if cleanup.stale_days == 0 {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "{org}/{repo} has stale_days=0: stale issues close on the next sweep"
                        ),
                    });
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
