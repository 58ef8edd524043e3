//! Markdown issue-template parsing and comparison.
//!
//! A template is a Markdown document whose sections start with a header line
//! such as `### Steps to reproduce`. Headers containing the required marker
//! (`[REQUIRED]` by default) name sections the reporter must fill in. An
//! issue body is parsed the same way and compared section by section.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_SECTION_PREFIX: &str = "###";
pub const DEFAULT_REQUIRED_MARKER: &str = "[REQUIRED]";

// ---------------------------------------------------------------------------
// TemplateOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOptions {
    #[serde(default = "default_section_prefix")]
    pub section_prefix: String,
    #[serde(default = "default_required_marker")]
    pub required_marker: String,
}

fn default_section_prefix() -> String {
    DEFAULT_SECTION_PREFIX.to_string()
}

fn default_required_marker() -> String {
    DEFAULT_REQUIRED_MARKER.to_string()
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            section_prefix: default_section_prefix(),
            required_marker: default_required_marker(),
        }
    }
}

impl TemplateOptions {
    fn header_start(&self) -> String {
        format!("{} ", self.section_prefix)
    }

    /// Strip the prefix and required marker from a header line, then trim and
    /// lowercase it.
    pub fn clean_name(&self, header: &str) -> String {
        let start = self.header_start();
        let name = header.strip_prefix(start.as_str()).unwrap_or(header);
        name.replacen(self.required_marker.as_str(), "", 1)
            .trim()
            .to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// TemplateSection / TemplateDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSection {
    pub raw_header: String,
    pub clean_name: String,
    pub required: bool,
    pub body: Vec<String>,
}

impl TemplateSection {
    fn body_tokens(&self) -> Vec<&str> {
        self.body
            .iter()
            .flat_map(|line| line.split_whitespace())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateDocument {
    pub sections: Vec<TemplateSection>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TemplateDocument {
    pub fn get(&self, clean_name: &str) -> Option<&TemplateSection> {
        self.index.get(clean_name).map(|&i| &self.sections[i])
    }

    pub fn contains(&self, clean_name: &str) -> bool {
        self.index.contains_key(clean_name)
    }

    pub fn required(&self) -> impl Iterator<Item = &TemplateSection> {
        self.sections.iter().filter(|s| s.required)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// A repeated header keeps its first position but takes the later body.
    fn push(&mut self, section: TemplateSection) {
        match self.index.get(&section.clean_name) {
            Some(&i) => self.sections[i] = section,
            None => {
                self.index
                    .insert(section.clean_name.clone(), self.sections.len());
                self.sections.push(section);
            }
        }
    }
}

/// Split Markdown text into sections. Lines before the first header are
/// discarded.
pub fn extract_sections(text: &str, opts: &TemplateOptions) -> TemplateDocument {
    let normalized = text.replace("\r\n", "\n");
    let start = opts.header_start();

    let mut doc = TemplateDocument::default();
    let mut current: Option<TemplateSection> = None;

    for line in normalized.split('\n') {
        if line.starts_with(start.as_str()) {
            if let Some(section) = current.take() {
                doc.push(section);
            }
            current = Some(TemplateSection {
                raw_header: line.to_string(),
                clean_name: opts.clean_name(line),
                required: line.contains(opts.required_marker.as_str()),
                body: Vec::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.body.push(line.to_string());
        }
    }
    if let Some(section) = current {
        doc.push(section);
    }
    doc
}

// ---------------------------------------------------------------------------
// SectionCheck
// ---------------------------------------------------------------------------

/// Result of comparing a candidate body against the template. `all` lists the
/// template sections considered, in template order; `invalid` is the
/// subsequence that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionCheck {
    pub all: Vec<String>,
    pub invalid: Vec<String>,
}

impl SectionCheck {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RequiredSectionValidation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredSectionValidation {
    /// No required section may be left untouched.
    #[default]
    Strict,
    /// At least one required section must be filled in.
    Relaxed,
    /// Required sections are not checked.
    None,
}

impl RequiredSectionValidation {
    /// How many required sections may be left empty.
    pub fn max_empty(self, required_count: usize) -> usize {
        match self {
            RequiredSectionValidation::Strict => 0,
            RequiredSectionValidation::Relaxed => required_count.saturating_sub(1),
            RequiredSectionValidation::None => required_count,
        }
    }

    pub fn accepts(self, check: &SectionCheck) -> bool {
        check.invalid.len() <= self.max_empty(check.all.len())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequiredSectionValidation::Strict => "strict",
            RequiredSectionValidation::Relaxed => "relaxed",
            RequiredSectionValidation::None => "none",
        }
    }
}

impl fmt::Display for RequiredSectionValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequiredSectionValidation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(RequiredSectionValidation::Strict),
            "relaxed" => Ok(RequiredSectionValidation::Relaxed),
            "none" => Ok(RequiredSectionValidation::None),
            other => Err(format!(
                "unknown required-section policy '{other}' (expected strict, relaxed or none)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A parsed canonical template that candidate issue bodies are checked
/// against.
#[derive(Debug, Clone)]
pub struct Template {
    opts: TemplateOptions,
    doc: TemplateDocument,
}

impl Template {
    pub fn parse(text: &str, opts: TemplateOptions) -> Self {
        let doc = extract_sections(text, &opts);
        Self { opts, doc }
    }

    pub fn document(&self) -> &TemplateDocument {
        &self.doc
    }

    /// Report every template section that is absent from `text`.
    pub fn matches_template_sections(&self, text: &str) -> SectionCheck {
        let candidate = extract_sections(text, &self.opts);
        let mut check = SectionCheck::default();
        for section in &self.doc.sections {
            check.all.push(section.clean_name.clone());
            if !candidate.contains(&section.clean_name) {
                check.invalid.push(section.clean_name.clone());
            }
        }
        check
    }

    /// Report every required template section that `text` either omits or
    /// leaves word-for-word identical to the template.
    pub fn required_sections_empty(&self, text: &str) -> SectionCheck {
        let candidate = extract_sections(text, &self.opts);
        let mut check = SectionCheck::default();
        for section in self.doc.required() {
            check.all.push(section.clean_name.clone());
            let unmodified = match candidate.get(&section.clean_name) {
                None => true,
                Some(filled) => filled.body_tokens() == section.body_tokens(),
            };
            if unmodified {
                check.invalid.push(section.clean_name.clone());
            }
        }
        check
    }
}

// ---------------------------------------------------------------------------
// TemplateCheck
// ---------------------------------------------------------------------------

/// Outcome of validating an issue body against its repository template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateCheck {
    Matches,
    MissingSections { sections: Vec<String> },
    EmptyRequiredSections { sections: Vec<String> },
    /// The canonical template could not be fetched or used.
    OtherError { reason: String },
}

impl TemplateCheck {
    /// Run both checks, missing sections first, under `policy`.
    pub fn evaluate(template: &Template, body: &str, policy: RequiredSectionValidation) -> Self {
        let sections = template.matches_template_sections(body);
        if !sections.is_valid() {
            return TemplateCheck::MissingSections {
                sections: sections.invalid,
            };
        }
        if policy != RequiredSectionValidation::None {
            let required = template.required_sections_empty(body);
            if !policy.accepts(&required) {
                return TemplateCheck::EmptyRequiredSections {
                    sections: required.invalid,
                };
            }
        }
        TemplateCheck::Matches
    }

    pub fn matches(&self) -> bool {
        matches!(self, TemplateCheck::Matches)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
Thanks for filing an issue!

### [REQUIRED] Environment
* OS version: _____
* SDK version: _____

### [REQUIRED] Steps to reproduce
What happened? How can we make the problem occur?

### Relevant code
```
// code here
```
";

    fn template() -> Template {
        Template::parse(TEMPLATE, TemplateOptions::default())
    }

    #[test]
    fn extract_sections_parses_headers_and_bodies() {
        let doc = extract_sections(TEMPLATE, &TemplateOptions::default());
        let names: Vec<&str> = doc.sections.iter().map(|s| s.clean_name.as_str()).collect();
        assert_eq!(names, vec!["environment", "steps to reproduce", "relevant code"]);
        assert!(doc.get("environment").unwrap().required);
        assert!(!doc.get("relevant code").unwrap().required);
        assert_eq!(doc.get("environment").unwrap().body[0], "* OS version: _____");
    }

    #[test]
    fn text_before_first_header_is_discarded() {
        let doc = extract_sections("preamble\nmore\n### A\nbody", &TemplateOptions::default());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].body, vec!["body".to_string()]);
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let doc = extract_sections("### A\r\nline one\r\n### B\r\n", &TemplateOptions::default());
        assert_eq!(doc.get("a").unwrap().body, vec!["line one".to_string()]);
        assert!(doc.contains("b"));
    }

    #[test]
    fn header_without_space_is_body_text() {
        let doc = extract_sections("### A\n###not a header\n#### deeper", &TemplateOptions::default());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.get("a").unwrap().body.len(), 2);
    }

    #[test]
    fn duplicate_header_keeps_position_and_takes_last_body() {
        let doc = extract_sections("### A\nfirst\n### B\nb\n### a\nsecond", &TemplateOptions::default());
        let names: Vec<&str> = doc.sections.iter().map(|s| s.clean_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(doc.get("a").unwrap().body, vec!["second".to_string()]);
    }

    #[test]
    fn clean_name_is_stable_when_reparsed() {
        let opts = TemplateOptions::default();
        let header = "### [REQUIRED]   Steps To Reproduce  ";
        let first = opts.clean_name(header);
        let second = opts.clean_name(&format!("### {first}"));
        assert_eq!(first, "steps to reproduce");
        assert_eq!(first, second);
    }

    #[test]
    fn custom_prefix_and_marker() {
        let opts = TemplateOptions {
            section_prefix: "##".into(),
            required_marker: "(required)".into(),
        };
        let doc = extract_sections("## Summary (required)\ntext\n### Not a section", &opts);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].clean_name, "summary");
        assert!(doc.sections[0].required);
    }

    #[test]
    fn missing_sections_are_reported_in_template_order() {
        let body = "### Relevant code\nfoo\n### Environment\nmac";
        let check = template().matches_template_sections(body);
        assert_eq!(
            check.all,
            vec!["environment", "steps to reproduce", "relevant code"]
        );
        assert_eq!(check.invalid, vec!["steps to reproduce"]);
    }

    #[test]
    fn required_marker_is_ignored_when_matching_names() {
        let body = "### Environment\nx\n### [REQUIRED] STEPS to reproduce\ny\n### Relevant code\n";
        assert!(template().matches_template_sections(body).is_valid());
    }

    #[test]
    fn verbatim_template_leaves_every_required_section_empty() {
        let check = template().required_sections_empty(TEMPLATE);
        assert_eq!(check.all, vec!["environment", "steps to reproduce"]);
        assert_eq!(check.invalid, check.all);
    }

    #[test]
    fn whitespace_reformatting_still_counts_as_empty() {
        let body = TEMPLATE
            .replace("* OS version: _____", "*   OS version:    _____  ")
            .replace("What happened? How", "What happened?\nHow");
        let check = template().required_sections_empty(&body);
        assert_eq!(check.invalid, vec!["environment", "steps to reproduce"]);
    }

    #[test]
    fn edited_required_sections_are_not_empty() {
        let body = TEMPLATE
            .replace("OS version: _____", "OS version: macOS 14")
            .replace("How can we make the problem occur?", "");
        let check = template().required_sections_empty(&body);
        assert!(check.invalid.is_empty(), "{:?}", check.invalid);
    }

    #[test]
    fn missing_required_section_counts_as_empty() {
        let body = "### Environment\niOS 17\n";
        let check = template().required_sections_empty(body);
        assert_eq!(check.invalid, vec!["steps to reproduce"]);
    }

    #[test]
    fn relaxed_accepts_one_filled_section_where_strict_rejects() {
        let tpl = Template::parse(
            "### [REQUIRED] A\na\n### [REQUIRED] B\nb\n### [REQUIRED] C\nc\n",
            TemplateOptions::default(),
        );
        let body = "### A\nfilled in\n### B\nb\n### C\nc\n";
        let check = tpl.required_sections_empty(body);
        assert_eq!(check.invalid, vec!["b", "c"]);
        assert!(!RequiredSectionValidation::Strict.accepts(&check));
        assert!(RequiredSectionValidation::Relaxed.accepts(&check));
        assert!(RequiredSectionValidation::None.accepts(&check));

        let untouched = tpl.required_sections_empty("### A\na\n### B\nb\n### C\nc\n");
        assert!(!RequiredSectionValidation::Relaxed.accepts(&untouched));
    }

    #[test]
    fn max_empty_per_policy() {
        assert_eq!(RequiredSectionValidation::Strict.max_empty(3), 0);
        assert_eq!(RequiredSectionValidation::Relaxed.max_empty(3), 2);
        assert_eq!(RequiredSectionValidation::Relaxed.max_empty(0), 0);
        assert_eq!(RequiredSectionValidation::None.max_empty(3), 3);
    }

    #[test]
    fn policy_parses_from_cli_text() {
        assert_eq!("Relaxed".parse::<RequiredSectionValidation>(), Ok(RequiredSectionValidation::Relaxed));
        assert!("lenient".parse::<RequiredSectionValidation>().is_err());
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let p: RequiredSectionValidation = serde_yaml::from_str("relaxed").unwrap();
        assert_eq!(p, RequiredSectionValidation::Relaxed);
        assert_eq!(RequiredSectionValidation::default(), RequiredSectionValidation::Strict);
    }

    #[test]
    fn evaluate_reports_missing_before_empty() {
        let tpl = template();
        let check = TemplateCheck::evaluate(&tpl, "", RequiredSectionValidation::Strict);
        assert!(matches!(check, TemplateCheck::MissingSections { ref sections } if sections.len() == 3));

        let check = TemplateCheck::evaluate(&tpl, TEMPLATE, RequiredSectionValidation::Strict);
        assert!(matches!(check, TemplateCheck::EmptyRequiredSections { .. }));

        let check = TemplateCheck::evaluate(&tpl, TEMPLATE, RequiredSectionValidation::None);
        assert!(check.matches());
    }
}
