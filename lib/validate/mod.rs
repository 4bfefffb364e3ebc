//! Connector manifest validation.
//!
//! Validation runs in two phases. The structural phase checks the raw JSON
//! against the fixed schema and collects every violation. Only when that
//! passes does the semantic phase run on the typed manifest. Either phase
//! failing produces a single [`MeshError::Validation`] whose first violation
//! is the primary message.

mod location;
mod messages;
mod semantic;

pub mod schema;


use std::path::Path;

use crate::error::{FieldViolation, MeshError, MeshResult};
use crate::manifest::{ConnectorManifest, ManifestDocument};

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use location::locate_key;
pub use schema::{SchemaViolation, check_manifest};
pub use semantic::{
    ValidationWarning, check_semantics, duplicate_tool_names, is_known_repo_host,
    is_strict_version,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A manifest that passed validation, plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// The accepted manifest.
    pub manifest: ConnectorManifest,

    /// Warnings that do not block publishing.
    pub warnings: Vec<ValidationWarning>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Load and validate the manifest at `manifest_path`.
pub fn validate(manifest_path: &Path) -> MeshResult<ConnectorManifest> {
    validate_with_warnings(manifest_path).map(|o| o.manifest)
}

/// Load and validate the manifest at `manifest_path`, keeping warnings.
pub fn validate_with_warnings(manifest_path: &Path) -> MeshResult<ValidationOutcome> {
    let document = ManifestDocument::load(manifest_path)?;
    validate_document(&document).map_err(|e| e.with_manifest_path(manifest_path))
}

/// Validate an already-loaded manifest document.
pub fn validate_document(document: &ManifestDocument) -> MeshResult<ValidationOutcome> {
    let structural: Vec<FieldViolation> = check_manifest(&document.value)
        .iter()
        .map(|v| to_field_violation(v, &document.text))
        .collect();

    if let Some(err) = MeshError::from_violations(structural) {
        tracing::debug!(path = %document.path.display(), "structural validation failed");
        return Err(err);
    }

    let manifest = document.parse()?;

    let (semantic, warnings) = check_semantics(&manifest);
    if let Some(err) = MeshError::from_violations(semantic) {
        tracing::debug!(path = %document.path.display(), "semantic validation failed");
        return Err(err);
    }

    tracing::debug!(id = %manifest.id, version = %manifest.metadata.version, "manifest is valid");
    Ok(ValidationOutcome { manifest, warnings })
}

fn to_field_violation(violation: &SchemaViolation, text: &str) -> FieldViolation {
    let position = violation.key().and_then(|key| locate_key(text, key));
    FieldViolation {
        field: violation.field(),
        message: messages::message_for(violation),
        line: position.map(|(line, _)| line),
        column: position.map(|(_, column)| column),
        suggestion: messages::suggestion_for(violation),
    }
}
