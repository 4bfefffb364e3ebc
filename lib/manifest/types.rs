//! Connector manifest type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The declarative description of a connector, as stored in `mcp.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorManifest {
    /// Schema identifier. Must equal [`SCHEMA_ID`](crate::constants::SCHEMA_ID).
    #[serde(rename = "$schema")]
    pub schema_ref: String,

    /// Unique connector slug.
    pub id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Invocable capabilities, in declaration order.
    pub tools: Vec<Tool>,

    /// Authentication the connector requires from its callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// ContextMesh registry metadata.
    #[serde(rename = "_contextmesh")]
    pub metadata: ConnectorMetadata,

    /// Fields this tool does not interpret, carried through to the registry.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One invocable capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name within the manifest.
    pub name: String,

    /// What the tool does.
    pub description: String,

    /// JSON schema of the tool input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,

    /// JSON schema of the tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

/// Authentication scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// OAuth 2.0 authorization code flow.
    #[serde(rename = "oauth2")]
    OAuth2 {
        /// Authorization endpoint.
        authorization_url: String,
        /// Token endpoint.
        token_url: String,
        /// Requested scopes.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<String>,
    },

    /// Static API key.
    ApiKey {
        /// Header carrying the key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        /// Human-readable hint on where to obtain the key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// HTTP basic authentication.
    Basic {
        /// Authentication realm.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        realm: Option<String>,
    },
}

/// The `_contextmesh` metadata section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    /// Strict `MAJOR.MINOR.PATCH` version.
    pub version: String,

    /// Between one and ten slug tags.
    pub tags: Vec<String>,

    /// Source language.
    pub language: Language,

    /// Source repository URL.
    pub repo: String,

    /// `sha256:<hex>` archive checksum, written by the publish pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Connector author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,

    /// SPDX license identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Clients the connector has been tested with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tested_with: Vec<TestedWith>,
}

/// Author information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Author name.
    pub name: String,

    /// Author email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Author URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A client the connector was verified against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestedWith {
    /// Client name (e.g. "claude-desktop").
    pub client: String,

    /// Client version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When the test was run (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_at: Option<String>,
}

/// Supported connector source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// `typescript`
    TypeScript,
    /// `javascript`
    JavaScript,
    /// `python`
    Python,
    /// `go`
    Go,
    /// `rust`
    Rust,
    /// `java`
    Java,
    /// `kotlin`
    Kotlin,
    /// `csharp`
    CSharp,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ConnectorManifest {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Names of all tools, in declaration order.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    /// Copy of this manifest carrying the given archive checksum.
    pub fn with_checksum(&self, checksum: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.metadata.checksum = Some(checksum.into());
        copy
    }
}

impl Language {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::CSharp => "csharp",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
