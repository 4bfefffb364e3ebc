//! Connector manifest loading.
//!
//! Loading is a pure read: the file is parsed once per invocation and never
//! written back.

mod types;

use std::path::{Path, PathBuf};

use crate::constants::MANIFEST_FILE;
use crate::error::{MeshError, MeshResult};

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use types::*;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A parsed but not yet validated manifest.
///
/// Keeps the raw text alongside the JSON tree so validation can recover
/// source positions.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    /// Where the manifest was read from.
    pub path: PathBuf,

    /// Raw file contents.
    pub text: String,

    /// Parsed JSON.
    pub value: serde_json::Value,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManifestDocument {
    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> MeshResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MeshError::file_not_found(path)
            } else {
                MeshError::io(e, path, "read")
            }
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| MeshError::invalid_content(path, e))?;

        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded manifest");

        Ok(Self {
            path: path.to_path_buf(),
            text,
            value,
        })
    }

    /// Deserialize into the typed manifest.
    pub fn parse(&self) -> MeshResult<ConnectorManifest> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| MeshError::invalid_content(&self.path, e))
    }
}

impl ConnectorManifest {
    /// Read and parse the manifest at `path` without validating it.
    pub fn load(path: &Path) -> MeshResult<Self> {
        ManifestDocument::load(path)?.parse()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Path of the manifest file inside a connector directory.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
