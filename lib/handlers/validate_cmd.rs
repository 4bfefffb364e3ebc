//! Validate command handler.

use colored::Colorize;
use serde_json::json;

use super::common::resolve_dir;
use crate::error::{ErrorKind, FieldViolation, MeshError, MeshResult};
use crate::format::render_warning;
use crate::manifest::manifest_path;
use crate::validate::{ValidationOutcome, ValidationWarning, validate_with_warnings};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Validate the manifest in `path`.
///
/// With `strict`, warnings fail validation too.
pub async fn validate_connector(path: Option<String>, strict: bool, json_output: bool) -> MeshResult<()> {
    let dir = resolve_dir(path)?;
    let manifest_file = manifest_path(&dir);

    let result = validate_with_warnings(&manifest_file).and_then(|outcome| {
        if strict && !outcome.warnings.is_empty() {
            let violations = outcome.warnings.iter().map(warning_violation).collect();
            if let Some(err) = MeshError::from_violations(violations) {
                return Err(err.with_manifest_path(&manifest_file));
            }
        }
        Ok(outcome)
    });

    if json_output {
        return output_json(&result);
    }

    let outcome = result?;
    output_full(&outcome);
    Ok(())
}

/// Print the result as JSON and exit with the error's code on failure.
fn output_json(result: &MeshResult<ValidationOutcome>) -> MeshResult<()> {
    let output = match result {
        Ok(outcome) => json!({
            "valid": true,
            "id": outcome.manifest.id,
            "version": outcome.manifest.metadata.version,
            "errors": [],
            "warnings": outcome.warnings,
        }),
        Err(MeshError::Validation(failure)) => json!({
            "valid": false,
            "kind": ErrorKind::Validation,
            "errors": failure.violations().collect::<Vec<_>>(),
            "warnings": [],
        }),
        Err(err) => json!({
            "valid": false,
            "kind": err.kind(),
            "errors": [{ "field": "", "message": err.to_string(), "suggestion": err.suggestion() }],
            "warnings": [],
        }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
    );

    if let Err(err) = result {
        std::process::exit(err.exit_code());
    }
    Ok(())
}

fn output_full(outcome: &ValidationOutcome) {
    println!();
    for warning in &outcome.warnings {
        println!("{}", render_warning(warning));
        println!();
    }

    let manifest = &outcome.manifest;
    let tools = manifest.tools.len();
    let summary = format!(
        "{}@{} ({} {})",
        manifest.id,
        manifest.metadata.version,
        tools,
        if tools == 1 { "tool" } else { "tools" }
    );

    match outcome.warnings.len() {
        0 => println!("  {} valid: {}", "✓".bright_green(), summary),
        n => println!(
            "  {} valid: {} ({} {})",
            "✓".bright_green(),
            summary,
            n,
            if n == 1 { "warning" } else { "warnings" }
        ),
    }
}

fn warning_violation(warning: &ValidationWarning) -> FieldViolation {
    FieldViolation {
        field: warning.field.clone(),
        message: warning.message.clone(),
        line: None,
        column: None,
        suggestion: Some("Use a repository hosted on a recognized provider.".into()),
    }
}
