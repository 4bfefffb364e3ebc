//! Constants for contextmesh-cli.
//!
//! Manifest, registry and packaging constants shared by every stage of the
//! publish pipeline.

use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The manifest file name inside a connector directory.
pub const MANIFEST_FILE: &str = "mcp.json";

/// Schema identifier every manifest must declare in `$schema`.
pub const SCHEMA_ID: &str = "https://mcp.dev/schema/1.0";

/// Key of the ContextMesh metadata section in the manifest.
pub const METADATA_KEY: &str = "_contextmesh";

/// Default registry URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.contextmesh.io";

/// Environment variable for a custom registry URL.
pub const REGISTRY_URL_ENV: &str = "CONTEXTMESH_REGISTRY";

/// Environment variable for the registry auth token.
pub const REGISTRY_TOKEN_ENV: &str = "CONTEXTMESH_TOKEN";

/// File name of the temporary archive written inside the connector directory.
pub const ARCHIVE_FILE: &str = ".contextmesh-publish.tar.gz";

/// Media type of the uploaded archive.
pub const ARCHIVE_MEDIA_TYPE: &str = "application/gzip";

/// Prefix of every checksum produced by the archiver.
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Supported connector source languages.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "typescript",
    "javascript",
    "python",
    "go",
    "rust",
    "java",
    "kotlin",
    "csharp",
];

/// Repository hosts recognized without a warning.
pub const KNOWN_REPO_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "sr.ht",
    "git.sr.ht",
];

/// Delay used for HTTP 429 responses without a usable `Retry-After` header.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

/// HTTP client timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
