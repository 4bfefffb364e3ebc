//! Init command handler.

use colored::Colorize;

use super::common::resolve_dir;
use crate::error::MeshResult;
use crate::manifest::manifest_path;
use crate::scaffold::ensure_manifest;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create a default manifest in `path` unless one already exists.
pub async fn init_connector(path: Option<String>) -> MeshResult<()> {
    let dir = resolve_dir(path)?;
    let existed = manifest_path(&dir).exists();
    let manifest = ensure_manifest(&dir)?;

    println!();
    if existed {
        println!(
            "  {} {} already exists",
            "·".dimmed(),
            manifest.display().to_string().bright_white()
        );
        return Ok(());
    }

    println!(
        "  {} Created {}",
        "✓".bright_green(),
        manifest.display().to_string().bright_white()
    );
    println!();
    println!(
        "    {}: edit the tools and {} sections, then run {}",
        "next".bright_blue().bold(),
        "_contextmesh".bold(),
        "contextmesh validate".bright_white()
    );
    Ok(())
}
