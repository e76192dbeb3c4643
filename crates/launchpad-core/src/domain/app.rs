//! App naming and catalog types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::OrchestratorError;

/// Name a deployment is keyed by.
///
/// Doubles as part of the container name, so the charset is restricted to
/// what the engine accepts: `[a-z0-9._-]`, at most 63 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn parse(s: impl Into<String>) -> Result<Self, OrchestratorError> {
        let s = s.into();
        if s.is_empty() || s.len() > 63 {
            return Err(OrchestratorError::Validation(format!(
                "app name must be 1..=63 characters, got {}",
                s.len()
            )));
        }
        let ok = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        if !ok {
            return Err(OrchestratorError::Validation(format!(
                "app name '{s}' may only contain [a-z0-9._-]"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Source reference for a deploy: a git URL or a local checkout path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoRef(String);

impl RepoRef {
    pub fn parse(s: impl Into<String>) -> Result<Self, OrchestratorError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "repository reference must not be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference needs a clone before building.
    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://") || self.0.starts_with("git@")
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Catalog row describing a deployable repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub repository: String,
    pub language: Option<String>,
    pub stars: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("chatbot")]
    #[case::dashes("my-app-2")]
    #[case::dots("svc.v1")]
    fn accepts_valid_names(#[case] name: &str) {
        assert!(AppName::parse(name).is_ok());
    }

    #[rstest]
    #[case::empty("")]
    #[case::uppercase("ChatBot")]
    #[case::space("chat bot")]
    #[case::slash("a/b")]
    fn rejects_invalid_names(#[case] name: &str) {
        assert!(AppName::parse(name).is_err());
    }

    #[test]
    fn rejects_overlong_name() {
        let name = "a".repeat(64);
        assert!(AppName::parse(name).is_err());
    }

    #[test]
    fn repo_ref_remote_detection() {
        assert!(RepoRef::parse("https://github.com/u/chatbot").unwrap().is_remote());
        assert!(RepoRef::parse("git@github.com:u/chatbot.git").unwrap().is_remote());
        assert!(!RepoRef::parse("/srv/checkouts/chatbot").unwrap().is_remote());
    }

    #[test]
    fn repo_ref_rejects_blank() {
        assert!(RepoRef::parse("   ").is_err());
    }
}
