//! Semantic checks the structural schema cannot express.

use serde::Serialize;
use std::collections::HashSet;

use crate::constants::KNOWN_REPO_HOSTS;
use crate::error::FieldViolation;
use crate::manifest::ConnectorManifest;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A non-fatal finding that does not block publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    /// JSON pointer of the field.
    pub field: String,

    /// Human-readable message.
    pub message: String,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Run all semantic checks, returning fatal violations and warnings.
pub fn check_semantics(manifest: &ConnectorManifest) -> (Vec<FieldViolation>, Vec<ValidationWarning>) {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    if manifest.tools.is_empty() {
        violations.push(semantic_violation(
            "/tools",
            "Connector must define at least one tool".into(),
            "Add a tools array with at least one entry.",
        ));
    }

    let duplicates = duplicate_tool_names(manifest);
    if !duplicates.is_empty() {
        violations.push(semantic_violation(
            "/tools",
            format!("Duplicate tool names found: {}", duplicates.join(", ")),
            "Give every tool a unique name.",
        ));
    }

    let version = &manifest.metadata.version;
    if !is_strict_version(version) {
        violations.push(semantic_violation(
            "/_contextmesh/version",
            format!("Invalid version format: {}", version),
            "Use MAJOR.MINOR.PATCH with numeric parts (e.g. \"1.0.0\").",
        ));
    }

    let repo = &manifest.metadata.repo;
    if !is_known_repo_host(repo) {
        let message = format!(
            "Repository host is not a recognized provider: {} (known: {})",
            repo,
            KNOWN_REPO_HOSTS.join(", ")
        );
        tracing::warn!(repo = %repo, "{}", message);
        warnings.push(ValidationWarning {
            field: "/_contextmesh/repo".into(),
            message,
        });
    }

    (violations, warnings)
}

/// Tool names declared more than once, in order of first repetition.
pub fn duplicate_tool_names(manifest: &ConnectorManifest) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for name in manifest.tool_names() {
        if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }
    duplicates
}

/// Whether `version` is exactly three dot-separated, all-numeric parts.
pub fn is_strict_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Whether the repository URL points at a recognized hosting provider.
pub fn is_known_repo_host(repo: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(repo) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    KNOWN_REPO_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}

fn semantic_violation(field: &str, message: String, suggestion: &str) -> FieldViolation {
    FieldViolation {
        field: field.into(),
        message,
        line: None,
        column: None,
        suggestion: Some(suggestion.into()),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_version() {
        assert!(is_strict_version("0.1.0"));
        assert!(is_strict_version("10.20.30"));
        assert!(!is_strict_version("1.0"));
        assert!(!is_strict_version("1.0.0.0"));
        assert!(!is_strict_version("1.a.0"));
        assert!(!is_strict_version("1..0"));
        assert!(!is_strict_version("1.0.0-beta"));
        assert!(!is_strict_version(""));
    }

    #[test]
    fn test_known_repo_hosts() {
        assert!(is_known_repo_host("https://github.com/a/b"));
        assert!(is_known_repo_host("https://www.github.com/a/b"));
        assert!(is_known_repo_host("https://GitLab.com/a/b"));
        assert!(!is_known_repo_host("https://git.example.com/a/b"));
        assert!(!is_known_repo_host("https://notgithub.com/a/b"));
        assert!(!is_known_repo_host("not a url"));
    }
}
