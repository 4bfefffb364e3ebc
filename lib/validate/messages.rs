//! User-facing messages and suggestions for structural violations.

use super::schema::{Format, Rule, SchemaViolation};
use crate::constants::SCHEMA_ID;
use crate::suggest::{find_similar, format_suggestions};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Primary message for a violation.
pub fn message_for(violation: &SchemaViolation) -> String {
    match &violation.rule {
        Rule::Required { property } => format!("Missing required property: {}", property),
        Rule::Pattern { pattern, value } => {
            format!("Invalid format: \"{}\" does not match \"{}\"", value, pattern)
        }
        Rule::Enum { allowed, .. } => {
            format!("Invalid value. Allowed values: {}", allowed.join(", "))
        }
        Rule::Format { format, .. } => format!("Invalid {} format", format),
        Rule::MinItems { limit } => format!("Array must have at least {} items", limit),
        Rule::MaxItems { limit } => format!("Array must have at most {} items", limit),
        Rule::Type { expected, actual } => format!("Expected {} but got {}", expected, actual),
    }
}

/// Suggested fix for a violation, if one is known.
pub fn suggestion_for(violation: &SchemaViolation) -> Option<String> {
    match &violation.rule {
        Rule::Required { property } => Some(required_suggestion(property)),
        Rule::Pattern { .. } => pattern_suggestion(violation.key()?).map(String::from),
        Rule::Enum { allowed, value } => {
            let similar = find_similar(value, allowed);
            format_suggestions(&similar)
                .or_else(|| Some(format!("Use one of: {}", allowed.join(", "))))
        }
        Rule::Format { format, .. } => Some(format_suggestion(*format).into()),
        Rule::MinItems { limit } => Some(format!("Add at least {} item(s).", limit)),
        Rule::MaxItems { limit } => Some(format!("Remove items so at most {} remain.", limit)),
        Rule::Type { expected, .. } => Some(format!("Change the value to a JSON {}.", expected)),
    }
}

fn required_suggestion(property: &str) -> String {
    let text = match property {
        "$schema" => return format!("Add \"$schema\": \"{}\" at the top level.", SCHEMA_ID),
        "id" => "Add an id made of lowercase letters, digits, and hyphens (e.g. \"my-connector\").",
        "tools" => "Add a tools array with at least one entry.",
        "_contextmesh" => "Add the metadata section with version, tags, language, and repo.",
        "version" => "Add a version in MAJOR.MINOR.PATCH form (e.g. \"0.1.0\").",
        "tags" => "Add between 1 and 10 tags (e.g. [\"search\"]).",
        "language" => "Add the source language (e.g. \"typescript\").",
        "repo" => "Add the source repository URL (e.g. \"https://github.com/acme/connector\").",
        "name" => "Add a name.",
        "description" => "Add a description explaining what it does.",
        "type" => "Add a type: one of oauth2, api_key, basic.",
        "authorization_url" => "Add the OAuth authorization endpoint URL.",
        "token_url" => "Add the OAuth token endpoint URL.",
        "client" => "Add the client name (e.g. \"claude-desktop\").",
        other => return format!("Add the \"{}\" property.", other),
    };
    text.to_string()
}

fn pattern_suggestion(key: &str) -> Option<&'static str> {
    let text = match key {
        "id" => "Ids use only lowercase letters, digits, and hyphens (e.g. \"my-connector\").",
        "tags" => "Tags use only lowercase letters, digits, and hyphens.",
        "version" => "Use MAJOR.MINOR.PATCH with numeric parts (e.g. \"1.0.0\").",
        "checksum" => {
            "Checksums look like sha256:<64 lowercase hex characters>. Publish writes this field; remove it from the manifest."
        }
        _ => return None,
    };
    Some(text)
}

fn format_suggestion(format: Format) -> &'static str {
    match format {
        Format::Email => "Use a valid email address (e.g. \"dev@example.com\").",
        Format::Uri => "Use an absolute URL (e.g. \"https://github.com/acme/connector\").",
        Format::DateTime => "Use an RFC 3339 timestamp (e.g. \"2024-01-15T09:30:00Z\").",
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
