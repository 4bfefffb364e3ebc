//! Default manifest for directories that do not have one yet.

use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::constants::{METADATA_KEY, SCHEMA_ID};
use crate::error::{MeshError, MeshResult};
use crate::manifest::manifest_path;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Slug used when the directory name yields nothing usable.
const FALLBACK_SLUG: &str = "connector";

static NON_SLUG_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9-]+").expect("slug pattern is valid"));

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Make sure `dir` has a manifest, writing the default one if it is missing.
///
/// Returns the manifest path. An existing manifest is left untouched.
pub fn ensure_manifest(dir: &Path) -> MeshResult<PathBuf> {
    let path = manifest_path(dir);
    if path.exists() {
        tracing::debug!(path = %path.display(), "manifest already exists");
        return Ok(path);
    }

    std::fs::create_dir_all(dir).map_err(|e| MeshError::io(e, dir, "create directory"))?;

    let base = directory_name(dir);
    let contents = default_manifest(&base);
    std::fs::write(&path, contents).map_err(|e| MeshError::io(e, &path, "write"))?;

    tracing::info!(path = %path.display(), "created default manifest");
    Ok(path)
}

/// Lowercase `name` and replace every run of characters outside `[a-z0-9-]` with one hyphen.
pub fn slugify(name: &str) -> String {
    NON_SLUG_RUN
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// `my-cool_connector` → `My Cool Connector`.
pub fn title_case(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// The default manifest for a directory called `base`, as pretty JSON.
pub fn default_manifest(base: &str) -> String {
    let slug = match slugify(base) {
        s if s.trim_matches('-').is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    };
    let name = match title_case(base) {
        n if n.is_empty() => title_case(&slug),
        n => n,
    };

    let manifest = json!({
        "$schema": SCHEMA_ID,
        "id": slug,
        "name": name,
        "description": format!("{} connector", name),
        "tools": [
            {
                "name": "hello",
                "description": "Return a greeting for the given name.",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" }
                    },
                    "required": ["name"]
                }
            }
        ],
        METADATA_KEY: {
            "version": "0.1.0",
            "tags": ["mcp"],
            "language": "typescript",
            "repo": format!("https://github.com/your-org/{}", slug)
        }
    });

    let mut text = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    text.push('\n');
    text
}

fn directory_name(dir: &Path) -> String {
    let resolved = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
