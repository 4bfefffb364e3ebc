//! The fixed structural schema of `mcp.json` and the walker that checks it.
//!
//! The schema is declared once as a tree of [`Node`]s. Walking an object
//! reports missing required properties first, in declaration order, then
//! descends into the present properties in declaration order, so the
//! violation list is stable for a given document.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use crate::constants::{METADATA_KEY, SCHEMA_ID, SUPPORTED_LANGUAGES};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A node of the fixed manifest schema.
#[derive(Debug)]
pub enum Node {
    /// Object with known properties.
    Object {
        /// Property schemas in declaration order.
        properties: Vec<(&'static str, Node)>,
        /// Required property names in declaration order.
        required: &'static [&'static str],
    },

    /// Object that must be one of several variants selected by a tag property.
    Tagged {
        /// Discriminator property.
        tag: &'static str,
        /// Variant schemas keyed by tag value.
        variants: Vec<(&'static str, Node)>,
    },

    /// Any JSON object; contents are not inspected.
    FreeObject,

    /// Array of homogeneous items.
    Array {
        items: Box<Node>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },

    /// String with optional constraints.
    String(StringRule),
}

/// Constraints on a string value.
#[derive(Debug, Default)]
pub struct StringRule {
    pattern: Option<Regex>,
    format: Option<Format>,
    allowed: Option<&'static [&'static str]>,
}

/// String formats the schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Email,
    Uri,
    DateTime,
}

/// JSON value types, as reported in type mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

/// The rule a value broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// A required property is absent.
    Required { property: String },

    /// String does not match the pattern.
    Pattern { pattern: String, value: String },

    /// Value is not one of the allowed values.
    Enum {
        allowed: Vec<String>,
        value: String,
    },

    /// String is not a valid instance of the format.
    Format { format: Format, value: String },

    /// Array is shorter than allowed.
    MinItems { limit: usize },

    /// Array is longer than allowed.
    MaxItems { limit: usize },

    /// Value has the wrong JSON type.
    Type { expected: JsonType, actual: JsonType },
}

/// One structural violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Path segments from the document root to the offending value.
    pub path: Vec<String>,

    /// What was violated.
    pub rule: Rule,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Pattern shared by the connector id and tags.
pub const SLUG_PATTERN: &str = "^[a-z0-9-]+$";

/// Version pattern. Anchored only at the start; the semantic pass is the strict gate.
pub const VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+";

/// Checksum pattern.
pub const CHECKSUM_PATTERN: &str = "^sha256:[0-9a-f]{64}$";

/// The manifest schema.
pub static MANIFEST_SCHEMA: LazyLock<Node> = LazyLock::new(build_manifest_schema);

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StringRule {
    /// Unconstrained string.
    pub fn any() -> Self {
        Self::default()
    }

    /// String matching `pattern`.
    pub fn pattern(pattern: &str) -> Self {
        Self {
            pattern: Some(Regex::new(pattern).expect("schema pattern is valid")),
            ..Self::default()
        }
    }

    /// String in a given format.
    pub fn format(format: Format) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    /// String restricted to a fixed set of values.
    pub fn one_of(allowed: &'static [&'static str]) -> Self {
        Self {
            allowed: Some(allowed),
            ..Self::default()
        }
    }
}

impl Node {
    /// Check `value` against this node, appending violations to `out`.
    pub fn check(&self, value: &Value, path: &mut Vec<String>, out: &mut Vec<SchemaViolation>) {
        match self {
            Node::Object {
                properties,
                required,
            } => {
                let Some(obj) = expect_type(value, JsonType::Object, path, out) else {
                    return;
                };
                check_object(obj, properties, required, path, out);
            }

            Node::Tagged { tag, variants } => {
                let Some(obj) = expect_type(value, JsonType::Object, path, out) else {
                    return;
                };
                let Some(tag_value) = obj.get(*tag) else {
                    out.push(violation(path, Rule::Required {
                        property: tag.to_string(),
                    }));
                    return;
                };

                path.push(tag.to_string());
                let names: Vec<&'static str> = variants.iter().map(|(n, _)| *n).collect();
                let selected = tag_value
                    .as_str()
                    .and_then(|t| variants.iter().find(|(n, _)| *n == t));
                let Some((_, variant)) = selected else {
                    out.push(violation(path, Rule::Enum {
                        allowed: names.iter().map(|n| n.to_string()).collect(),
                        value: display_value(tag_value),
                    }));
                    path.pop();
                    return;
                };
                path.pop();

                variant.check(value, path, out);
            }

            Node::FreeObject => {
                expect_type(value, JsonType::Object, path, out);
            }

            Node::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(arr) = value.as_array() else {
                    out.push(violation(path, Rule::Type {
                        expected: JsonType::Array,
                        actual: JsonType::of(value),
                    }));
                    return;
                };

                if let Some(limit) = *min_items
                    && arr.len() < limit
                {
                    out.push(violation(path, Rule::MinItems { limit }));
                }
                if let Some(limit) = *max_items
                    && arr.len() > limit
                {
                    out.push(violation(path, Rule::MaxItems { limit }));
                }

                for (i, item) in arr.iter().enumerate() {
                    path.push(i.to_string());
                    items.check(item, path, out);
                    path.pop();
                }
            }

            Node::String(rule) => {
                let Some(s) = value.as_str() else {
                    out.push(violation(path, Rule::Type {
                        expected: JsonType::String,
                        actual: JsonType::of(value),
                    }));
                    return;
                };
                rule.check(s, path, out);
            }
        }
    }
}

impl StringRule {
    fn check(&self, s: &str, path: &[String], out: &mut Vec<SchemaViolation>) {
        if let Some(allowed) = self.allowed
            && !allowed.contains(&s)
        {
            out.push(violation(path, Rule::Enum {
                allowed: allowed.iter().map(|a| a.to_string()).collect(),
                value: s.to_string(),
            }));
        }

        if let Some(pattern) = &self.pattern
            && !pattern.is_match(s)
        {
            out.push(violation(path, Rule::Pattern {
                pattern: pattern.as_str().to_string(),
                value: s.to_string(),
            }));
        }

        if let Some(format) = self.format
            && !format.matches(s)
        {
            out.push(violation(path, Rule::Format {
                format,
                value: s.to_string(),
            }));
        }
    }
}

impl Format {
    /// Whether `s` is a valid instance of this format.
    pub fn matches(&self, s: &str) -> bool {
        match self {
            Format::Email => EMAIL_RE.is_match(s),
            Format::Uri => reqwest::Url::parse(s).is_ok_and(|u| u.has_host()),
            Format::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        }
    }

    /// Schema keyword for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Email => "email",
            Format::Uri => "uri",
            Format::DateTime => "date-time",
        }
    }
}

impl JsonType {
    /// The type of a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

impl SchemaViolation {
    /// JSON pointer of the offending value (`""` for the root).
    pub fn pointer(&self) -> String {
        self.path.iter().map(|s| format!("/{}", s)).collect()
    }

    /// JSON pointer of the field the violation is about.
    ///
    /// For a missing property this is the property itself, not its parent.
    pub fn field(&self) -> String {
        match &self.rule {
            Rule::Required { property } => format!("{}/{}", self.pointer(), property),
            _ => self.pointer(),
        }
    }

    /// Deepest named (non-index) segment of [`field`](Self::field).
    pub fn key(&self) -> Option<&str> {
        if let Rule::Required { property } = &self.rule {
            return Some(property);
        }
        self.path
            .iter()
            .rev()
            .find(|s| s.parse::<usize>().is_err())
            .map(String::as_str)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Check a manifest document against [`MANIFEST_SCHEMA`].
pub fn check_manifest(value: &Value) -> Vec<SchemaViolation> {
    let mut out = Vec::new();
    MANIFEST_SCHEMA.check(value, &mut Vec::new(), &mut out);
    out
}

fn check_object(
    obj: &serde_json::Map<String, Value>,
    properties: &[(&'static str, Node)],
    required: &[&'static str],
    path: &mut Vec<String>,
    out: &mut Vec<SchemaViolation>,
) {
    for name in required {
        if !obj.contains_key(*name) {
            out.push(violation(path, Rule::Required {
                property: name.to_string(),
            }));
        }
    }

    for (name, node) in properties {
        if let Some(child) = obj.get(*name) {
            path.push(name.to_string());
            node.check(child, path, out);
            path.pop();
        }
    }
}

fn expect_type<'a>(
    value: &'a Value,
    expected: JsonType,
    path: &[String],
    out: &mut Vec<SchemaViolation>,
) -> Option<&'a serde_json::Map<String, Value>> {
    match value.as_object() {
        Some(obj) => Some(obj),
        None => {
            out.push(violation(path, Rule::Type {
                expected,
                actual: JsonType::of(value),
            }));
            None
        }
    }
}

fn violation(path: &[String], rule: Rule) -> SchemaViolation {
    SchemaViolation {
        path: path.to_vec(),
        rule,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_manifest_schema() -> Node {
    static SCHEMA_IDS: &[&str] = &[SCHEMA_ID];

    let tool = Node::Object {
        properties: vec![
            ("name", Node::String(StringRule::any())),
            ("description", Node::String(StringRule::any())),
            ("input_schema", Node::FreeObject),
            ("output_schema", Node::FreeObject),
        ],
        required: &["name", "description"],
    };

    let auth = Node::Tagged {
        tag: "type",
        variants: vec![
            (
                "oauth2",
                Node::Object {
                    properties: vec![
                        ("authorization_url", Node::String(StringRule::format(Format::Uri))),
                        ("token_url", Node::String(StringRule::format(Format::Uri))),
                        (
                            "scopes",
                            Node::Array {
                                items: Box::new(Node::String(StringRule::any())),
                                min_items: None,
                                max_items: None,
                            },
                        ),
                    ],
                    required: &["type", "authorization_url", "token_url"],
                },
            ),
            (
                "api_key",
                Node::Object {
                    properties: vec![
                        ("header", Node::String(StringRule::any())),
                        ("description", Node::String(StringRule::any())),
                    ],
                    required: &["type"],
                },
            ),
            (
                "basic",
                Node::Object {
                    properties: vec![("realm", Node::String(StringRule::any()))],
                    required: &["type"],
                },
            ),
        ],
    };

    let author = Node::Object {
        properties: vec![
            ("name", Node::String(StringRule::any())),
            ("email", Node::String(StringRule::format(Format::Email))),
            ("url", Node::String(StringRule::format(Format::Uri))),
        ],
        required: &["name"],
    };

    let tested_with = Node::Object {
        properties: vec![
            ("client", Node::String(StringRule::any())),
            ("version", Node::String(StringRule::any())),
            ("tested_at", Node::String(StringRule::format(Format::DateTime))),
        ],
        required: &["client"],
    };

    let metadata = Node::Object {
        properties: vec![
            ("version", Node::String(StringRule::pattern(VERSION_PATTERN))),
            (
                "tags",
                Node::Array {
                    items: Box::new(Node::String(StringRule::pattern(SLUG_PATTERN))),
                    min_items: Some(1),
                    max_items: Some(10),
                },
            ),
            ("language", Node::String(StringRule::one_of(SUPPORTED_LANGUAGES))),
            ("repo", Node::String(StringRule::format(Format::Uri))),
            ("checksum", Node::String(StringRule::pattern(CHECKSUM_PATTERN))),
            ("author", author),
            ("license", Node::String(StringRule::any())),
            (
                "tested_with",
                Node::Array {
                    items: Box::new(tested_with),
                    min_items: None,
                    max_items: None,
                },
            ),
        ],
        required: &["version", "tags", "language", "repo"],
    };

    Node::Object {
        properties: vec![
            ("$schema", Node::String(StringRule::one_of(SCHEMA_IDS))),
            ("id", Node::String(StringRule::pattern(SLUG_PATTERN))),
            ("name", Node::String(StringRule::any())),
            ("description", Node::String(StringRule::any())),
            (
                "tools",
                Node::Array {
                    items: Box::new(tool),
                    min_items: None,
                    max_items: None,
                },
            ),
            ("auth", auth),
            (METADATA_KEY, metadata),
        ],
        required: &["$schema", "id", "tools", METADATA_KEY],
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "$schema": "https://mcp.dev/schema/1.0",
            "id": "demo",
            "tools": [{ "name": "t", "description": "d" }],
            "_contextmesh": {
                "version": "0.1.0",
                "tags": ["x"],
                "language": "typescript",
                "repo": "https://github.com/a/b"
            }
        })
    }

    #[test]
    fn test_valid_document_has_no_violations() {
        assert!(check_manifest(&valid()).is_empty());
    }

    #[test]
    fn test_required_reported_in_declaration_order() {
        let violations = check_manifest(&json!({ "id": "demo" }));
        let missing: Vec<_> = violations
            .iter()
            .filter_map(|v| match &v.rule {
                Rule::Required { property } => Some(property.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["$schema", "tools", "_contextmesh"]);
        assert_eq!(violations[0].field(), "/$schema");
    }

    #[test]
    fn test_pattern_on_nested_array_item() {
        let mut doc = valid();
        doc["_contextmesh"]["tags"] = json!(["ok", "Not_Ok"]);
        let violations = check_manifest(&doc);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].pointer(), "/_contextmesh/tags/1");
        assert_eq!(violations[0].key(), Some("tags"));
        assert!(matches!(violations[0].rule, Rule::Pattern { .. }));
    }

    #[test]
    fn test_array_bounds() {
        let mut doc = valid();
        doc["_contextmesh"]["tags"] = json!([]);
        assert_eq!(
            check_manifest(&doc)[0].rule,
            Rule::MinItems { limit: 1 }
        );

        let eleven: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
        doc["_contextmesh"]["tags"] = json!(eleven);
        assert_eq!(
            check_manifest(&doc)[0].rule,
            Rule::MaxItems { limit: 10 }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let mut doc = valid();
        doc["tools"] = json!("nope");
        assert_eq!(
            check_manifest(&doc)[0].rule,
            Rule::Type {
                expected: JsonType::Array,
                actual: JsonType::String
            }
        );
    }

    #[test]
    fn test_tagged_auth_variants() {
        let mut doc = valid();
        doc["auth"] = json!({ "type": "api_key", "header": "X-Key" });
        assert!(check_manifest(&doc).is_empty());

        doc["auth"] = json!({ "type": "oauth2", "authorization_url": "not a url" });
        let violations = check_manifest(&doc);
        assert_eq!(violations[0].field(), "/auth/token_url");
        assert!(matches!(violations[1].rule, Rule::Format { format: Format::Uri, .. }));

        doc["auth"] = json!({ "type": "saml" });
        assert!(matches!(check_manifest(&doc)[0].rule, Rule::Enum { .. }));
    }

    #[test]
    fn test_formats() {
        assert!(Format::Email.matches("dev@example.com"));
        assert!(!Format::Email.matches("dev.example.com"));
        assert!(Format::Uri.matches("https://github.com/a/b"));
        assert!(!Format::Uri.matches("github.com/a/b"));
        assert!(Format::DateTime.matches("2024-01-15T09:30:00Z"));
        assert!(!Format::DateTime.matches("2024-01-15"));
    }

    #[test]
    fn test_version_pattern_is_lenient_about_suffixes() {
        let mut doc = valid();
        doc["_contextmesh"]["version"] = json!("1.0.0.0");
        assert!(check_manifest(&doc).is_empty());

        doc["_contextmesh"]["version"] = json!("1.0");
        assert!(matches!(
            check_manifest(&doc)[0].rule,
            Rule::Pattern { .. }
        ));
    }
}
