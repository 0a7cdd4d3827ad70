// src/core/policy.rs

//! Loads the declarative header policy. A policy is validated once on load
//! and is read-only afterwards.

use crate::core::error::ConfigError;
use crate::core::models::{Condition, HeaderRule};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Entry in `unwanted_headers` / `upcoming_headers`. Only the name matters.
#[derive(Debug, Deserialize)]
struct NamedRule {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    headers: Vec<HeaderRule>,
    #[serde(default)]
    unwanted_headers: Vec<NamedRule>,
    #[serde(default)]
    upcoming_headers: Vec<NamedRule>,
}

#[derive(Debug, Clone)]
pub struct Policy {
    required: Vec<HeaderRule>,
    unwanted: Vec<HeaderRule>,
    upcoming: Vec<HeaderRule>,
}

impl Policy {
    pub fn new(
        required: Vec<HeaderRule>,
        unwanted: Vec<HeaderRule>,
        upcoming: Vec<HeaderRule>,
    ) -> Result<Self, ConfigError> {
        if required.is_empty() && unwanted.is_empty() {
            return Err(ConfigError::NoScoredRules);
        }
        for (section, rules) in [
            ("headers", &required),
            ("unwanted_headers", &unwanted),
            ("upcoming_headers", &upcoming),
        ] {
            if rules.iter().any(|r| r.name.trim().is_empty()) {
                return Err(ConfigError::EmptyName { section });
            }
        }
        Ok(Self { required, unwanted, upcoming })
    }

    /// Parses a TOML policy document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let doc: PolicyDocument = toml::from_str(content)?;
        if doc.headers.is_empty() && doc.unwanted_headers.is_empty() && doc.upcoming_headers.is_empty() {
            return Err(ConfigError::Empty);
        }

        let unwanted = doc
            .unwanted_headers
            .into_iter()
            .map(|r| HeaderRule::new(r.name.trim(), Condition::NotPresent))
            .collect();
        let upcoming = doc
            .upcoming_headers
            .into_iter()
            .map(|r| HeaderRule::new(r.name.trim(), Condition::Present))
            .collect();
        let required = doc
            .headers
            .into_iter()
            .map(|r| HeaderRule::new(r.name.trim(), r.expected_condition))
            .collect();

        Policy::new(required, unwanted, upcoming)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading policy document.");
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound { path: path.to_path_buf() }
            } else {
                ConfigError::Io { path: path.to_path_buf(), source: e }
            }
        })?;
        let policy = Self::from_toml(&content)?;
        info!(
            path = %path.display(),
            required = policy.required.len(),
            unwanted = policy.unwanted.len(),
            upcoming = policy.upcoming.len(),
            "Policy loaded."
        );
        Ok(policy)
    }

    pub fn required(&self) -> &[HeaderRule] {
        &self.required
    }

    pub fn unwanted(&self) -> &[HeaderRule] {
        &self.unwanted
    }

    pub fn upcoming(&self) -> &[HeaderRule] {
        &self.upcoming
    }

    /// Required plus unwanted rules; upcoming rules are never scored.
    pub fn scored_rule_count(&self) -> usize {
        self.required.len() + self.unwanted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHIPPED_POLICY: &str = include_str!("../../headers_config.toml");

    #[test]
    fn test_shipped_policy_parses() {
        let policy = Policy::from_toml(SHIPPED_POLICY).unwrap();
        assert!(!policy.required().is_empty());
        assert!(policy.unwanted().iter().any(|r| r.name == "Server"));
        assert!(policy.unwanted().iter().all(|r| r.expected_condition == Condition::NotPresent));
        assert_eq!(
            policy.scored_rule_count(),
            policy.required().len() + policy.unwanted().len()
        );
    }

    #[test]
    fn test_condition_defaults_to_present() {
        let doc = r#"
            [[headers]]
            name = "Strict-Transport-Security"

            [[headers]]
            name = "X-XSS-Protection"
            condition = "not_present"
        "#;
        let policy = Policy::from_toml(doc).unwrap();
        assert_eq!(policy.required()[0].expected_condition, Condition::Present);
        assert_eq!(policy.required()[1].expected_condition, Condition::NotPresent);
        assert!(policy.upcoming().is_empty());
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert!(matches!(Policy::from_toml(""), Err(ConfigError::Empty)));
        assert!(matches!(Policy::from_toml("# nothing here\n"), Err(ConfigError::Empty)));
    }

    #[test]
    fn test_only_upcoming_rules_is_rejected() {
        let doc = r#"
            [[upcoming_headers]]
            name = "Origin-Agent-Cluster"
        "#;
        assert!(matches!(Policy::from_toml(doc), Err(ConfigError::NoScoredRules)));
    }

    #[test]
    fn test_unparseable_document_is_rejected() {
        assert!(matches!(Policy::from_toml("headers = [[["), Err(ConfigError::Parse(_))));
        let bad_condition = r#"
            [[headers]]
            name = "X-Frame-Options"
            condition = "sometimes"
        "#;
        assert!(matches!(Policy::from_toml(bad_condition), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_blank_rule_name_is_rejected() {
        let doc = r#"
            [[unwanted_headers]]
            name = "  "
        "#;
        assert!(matches!(
            Policy::from_toml(doc),
            Err(ConfigError::EmptyName { section: "unwanted_headers" })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Policy::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHIPPED_POLICY.as_bytes()).unwrap();
        let policy = Policy::load(file.path()).unwrap();
        assert_eq!(policy.upcoming().len(), 2);
    }
}
