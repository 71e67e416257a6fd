//! Document exclusion filters compiled from [`Settings`].

use serde_json::Value;
use tasks_aio_core::{Document, Frontmatter};

use crate::settings::Settings;

/// Front-matter rule: `key` matches presence, `key: value` matches an exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PropertyRule {
    Present(String),
    Equals { key: String, value: String },
}

impl PropertyRule {
    // Split on the first `:` only; keys and values containing `:` cannot be expressed.
    fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((key, value)) => Self::Equals {
                key: key.trim().to_owned(),
                value: value.trim().to_owned(),
            },
            None => Self::Present(raw.trim().to_owned()),
        }
    }

    fn matches(&self, frontmatter: &Frontmatter) -> bool {
        match self {
            Self::Present(key) => frontmatter.contains_key(key),
            Self::Equals { key, value } => frontmatter.get(key).is_some_and(|actual| match actual {
                Value::String(text) => text == value,
                Value::Bool(flag) => coerce_bool(value) == Some(*flag),
                _ => false,
            }),
        }
    }
}

fn coerce_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Why a document is kept out of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Outside the configured inbox folder.
    OutsideInbox,
    /// Under an excluded folder.
    Folder,
    /// File name contains an excluded keyword.
    FileName,
    /// Front matter matches an excluded property rule.
    Property,
}

/// Compiled exclusion filters, applied in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    inbox_folder: Option<String>,
    folders: Vec<String>,
    file_keywords: Vec<String>,
    properties: Vec<PropertyRule>,
}

impl ExclusionRules {
    /// Compile the filters configured in `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            inbox_folder: Some(settings.inbox_folder.clone()).filter(|folder| !folder.is_empty()),
            folders: settings.excluded_folders.clone(),
            file_keywords: settings.excluded_files.clone(),
            properties: settings
                .excluded_properties
                .iter()
                .map(|raw| PropertyRule::parse(raw))
                .collect(),
        }
    }

    /// Apply the path-based filters (inbox whitelist, folders, file names).
    #[must_use]
    pub fn check_path(&self, document: &Document) -> Option<Exclusion> {
        let path = document.path.as_str();
        if self
            .inbox_folder
            .as_deref()
            .is_some_and(|inbox| !path.starts_with(inbox))
        {
            return Some(Exclusion::OutsideInbox);
        }
        if self.folders.iter().any(|folder| path.starts_with(folder.as_str())) {
            return Some(Exclusion::Folder);
        }
        let name = document.name();
        if self.file_keywords.iter().any(|keyword| name.contains(keyword.as_str())) {
            return Some(Exclusion::FileName);
        }
        None
    }

    /// Whether any front-matter rule is configured.
    #[must_use]
    pub fn inspects_frontmatter(&self) -> bool {
        !self.properties.is_empty()
    }

    /// Apply the front-matter rules. Documents without front matter always pass.
    #[must_use]
    pub fn check_frontmatter(&self, frontmatter: Option<&Frontmatter>) -> Option<Exclusion> {
        let frontmatter = frontmatter?;
        self.properties
            .iter()
            .any(|rule| rule.matches(frontmatter))
            .then_some(Exclusion::Property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(configure: impl FnOnce(&mut Settings)) -> ExclusionRules {
        let mut settings = Settings::default();
        configure(&mut settings);
        ExclusionRules::from_settings(&settings)
    }

    fn doc(path: &str) -> Document {
        Document::new(path, 0)
    }

    fn frontmatter(value: serde_json::Value) -> Frontmatter {
        Frontmatter::from_value(value)
    }

    #[test]
    fn inbox_folder_is_a_whitelist() {
        let rules = rules(|s| s.inbox_folder = "Work".into());
        assert_eq!(rules.check_path(&doc("Home/a.md")), Some(Exclusion::OutsideInbox));
        assert_eq!(rules.check_path(&doc("Work/a.md")), None);
    }

    #[test]
    fn default_folders_and_file_keywords_exclude() {
        let rules = rules(|s| s.excluded_files = vec!["draft".into()]);
        assert_eq!(rules.check_path(&doc("Templates/daily.md")), Some(Exclusion::Folder));
        assert_eq!(rules.check_path(&doc("Archive/2023/old.md")), Some(Exclusion::Folder));
        assert_eq!(rules.check_path(&doc("Notes/draft-plan.md")), Some(Exclusion::FileName));
        assert_eq!(rules.check_path(&doc("drafts/plan.md")), None);
        assert_eq!(rules.check_path(&doc("Notes/plan.md")), None);
    }

    #[test]
    fn bare_property_matches_presence() {
        let rules = rules(|s| s.excluded_properties = vec!["private".into()]);
        assert!(rules.inspects_frontmatter());
        assert_eq!(
            rules.check_frontmatter(Some(&frontmatter(json!({ "private": null })))),
            Some(Exclusion::Property)
        );
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "public": true })))), None);
        assert_eq!(rules.check_frontmatter(None), None);
    }

    #[test]
    fn key_value_property_coerces_booleans() {
        let rules = rules(|s| {
            s.excluded_properties = vec!["archived: true".into(), "status:done".into()];
        });
        let excluded = Some(Exclusion::Property);
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "archived": true })))), excluded);
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "archived": "true" })))), excluded);
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "archived": false })))), None);
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "status": "done" })))), excluded);
        assert_eq!(rules.check_frontmatter(Some(&frontmatter(json!({ "status": "open" })))), None);
    }

    #[test]
    fn property_rule_splits_on_first_colon() {
        assert_eq!(
            PropertyRule::parse(" url : https://example.com "),
            PropertyRule::Equals {
                key: "url".into(),
                value: "https://example.com".into()
            }
        );
    }
}
