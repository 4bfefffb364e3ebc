//! Common utilities for command handlers.

use std::path::{Path, PathBuf};

use crate::error::{MeshError, MeshResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The directory a command operates on: `path`, or the current directory.
pub fn resolve_dir(path: Option<String>) -> MeshResult<PathBuf> {
    match path {
        Some(p) => Ok(PathBuf::from(p)),
        None => std::env::current_dir().map_err(|e| MeshError::io(e, Path::new("."), "read directory")),
    }
}
