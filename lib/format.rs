//! Rendering errors and warnings for the terminal.
//!
//! The core returns structured errors; everything here runs after the core
//! has returned and only decides how they look.

use colored::Colorize;
use std::error::Error;
use std::fmt::Write;

use crate::error::{
    AuthFailure, FieldViolation, FilesystemFailure, MeshError, NetworkFailure, ValidationFailure,
};
use crate::validate::ValidationWarning;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Render an error, kind-aware. `verbose` adds every violation and the cause chain.
pub fn render_error(err: &MeshError, verbose: bool) -> String {
    let mut out = String::new();
    let label = format!("error[{}]", err.kind()).bright_red().bold();
    let _ = writeln!(out, "  {}: {}", label, err);

    match err {
        MeshError::Validation(v) => render_validation(&mut out, v, verbose),
        MeshError::Network(n) => render_network(&mut out, n),
        MeshError::Auth(a) => render_auth(&mut out, a),
        MeshError::Filesystem(f) => render_filesystem(&mut out, f),
        MeshError::General(_) => {}
    }

    if !matches!(err, MeshError::Validation(_))
        && let Some(suggestion) = err.suggestion()
    {
        push_hint(&mut out, "    ", suggestion);
    }

    if verbose {
        render_causes(&mut out, err);
    }

    out
}

/// Render a non-fatal validation warning.
pub fn render_warning(warning: &ValidationWarning) -> String {
    format!(
        "  {}: → {}\n      {} {}",
        "warning".bright_yellow().bold(),
        warning.field.bold(),
        "└─".dimmed(),
        warning.message.dimmed()
    )
}

/// Format byte size.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1_000 {
        format!("{} B", bytes)
    } else if bytes < 1_000_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    }
}

fn render_validation(out: &mut String, failure: &ValidationFailure, verbose: bool) {
    render_violation(out, failure, &failure.primary);

    if failure.additional.is_empty() {
        return;
    }

    if verbose {
        for violation in &failure.additional {
            let _ = writeln!(out);
            let _ = writeln!(out, "  {}: {}", "error".bright_red(), violation.message);
            render_violation(out, failure, violation);
        }
    } else {
        let more = failure.additional.len();
        let _ = writeln!(
            out,
            "    {}",
            format!(
                "(+{} more {}, rerun with --verbose to see all)",
                more,
                if more == 1 { "error" } else { "errors" }
            )
            .dimmed()
        );
    }
}

fn render_violation(out: &mut String, failure: &ValidationFailure, violation: &FieldViolation) {
    if let (Some(path), Some(line)) = (&failure.manifest_path, violation.line) {
        let column = violation.column.unwrap_or(1);
        let _ = writeln!(
            out,
            "    {} {}:{}:{}",
            "-->".bright_blue(),
            path.display(),
            line,
            column
        );
    }
    if !violation.field.is_empty() {
        let _ = writeln!(out, "    {}: {}", "field".dimmed(), violation.field);
    }
    if let Some(suggestion) = &violation.suggestion {
        push_hint(out, "    ", suggestion);
    }
}

fn render_network(out: &mut String, failure: &NetworkFailure) {
    if let Some(status) = failure.status_code {
        let _ = writeln!(out, "    {}: {}", "status".dimmed(), status);
    }
    if let Some(endpoint) = &failure.endpoint {
        let _ = writeln!(out, "    {}: {}", "endpoint".dimmed(), endpoint);
    }
    let _ = writeln!(
        out,
        "    {}: {}",
        "retryable".dimmed(),
        if failure.retryable { "yes" } else { "no" }
    );
    if let Some(delay) = failure.retry_after {
        let _ = writeln!(out, "    {}: {}s", "retry after".dimmed(), delay.as_secs());
    }
}

fn render_auth(out: &mut String, failure: &AuthFailure) {
    let _ = writeln!(
        out,
        "    {}: {}",
        "token".dimmed(),
        if failure.token_present { "present" } else { "missing" }
    );
}

fn render_filesystem(out: &mut String, failure: &FilesystemFailure) {
    if let Some(path) = &failure.path {
        let _ = writeln!(out, "    {}: {}", "path".dimmed(), path.display());
    }
    if let Some(operation) = &failure.operation {
        let _ = writeln!(out, "    {}: {}", "operation".dimmed(), operation);
    }
}

fn render_causes(out: &mut String, err: &MeshError) {
    // The top-level variant is transparent, so its first source is the payload's cause.
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(out, "    {}: {}", "caused by".dimmed(), cause);
        source = cause.source();
    }
}

fn push_hint(out: &mut String, indent: &str, hint: &str) {
    let _ = writeln!(out, "{}{}: {}", indent, "hint".bright_blue().bold(), hint);
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn plain() {
        colored::control::set_override(false);
    }

    fn violation(field: &str, message: &str) -> FieldViolation {
        FieldViolation {
            field: field.into(),
            message: message.into(),
            line: Some(3),
            column: Some(5),
            suggestion: Some("do the thing".into()),
        }
    }

    #[test]
    fn test_network_details() {
        plain();
        let err = MeshError::http_status(
            429,
            "https://api.contextmesh.io/v1/connectors",
            None,
            Some(Duration::from_secs(10)),
        );
        let text = render_error(&err, false);
        assert!(text.contains("error[NETWORK_ERROR]: Rate limited"));
        assert!(text.contains("status: 429"));
        assert!(text.contains("endpoint: https://api.contextmesh.io/v1/connectors"));
        assert!(text.contains("retryable: yes"));
        assert!(text.contains("retry after: 10s"));
        assert!(text.contains("hint: "));
    }

    #[test]
    fn test_filesystem_details() {
        plain();
        let err = MeshError::file_not_found(Path::new("/tmp/x/mcp.json"));
        let text = render_error(&err, false);
        assert!(text.contains("File not found: /tmp/x/mcp.json"));
        assert!(text.contains("path: /tmp/x/mcp.json"));
        assert!(text.contains("operation: read"));
    }

    #[test]
    fn test_auth_token_presence() {
        plain();
        assert!(render_error(&MeshError::missing_token(), false).contains("token: missing"));
        assert!(render_error(&MeshError::invalid_token("expired"), false).contains("token: present"));
    }

    #[test]
    fn test_validation_collapses_extra_violations() {
        plain();
        let err = MeshError::validation(
            violation("/id", "first"),
            vec![violation("/tools", "second"), violation("/tags", "third")],
        )
        .with_manifest_path(Path::new("mcp.json"));

        let text = render_error(&err, false);
        assert!(text.contains("error[VALIDATION_ERROR]: first"));
        assert!(text.contains("--> mcp.json:3:5"));
        assert!(text.contains("field: /id"));
        assert!(text.contains("hint: do the thing"));
        assert!(text.contains("+2 more errors"));
        assert!(!text.contains("second"));

        let verbose = render_error(&err, true);
        assert!(verbose.contains("second"));
        assert!(verbose.contains("field: /tags"));
        assert!(!verbose.contains("more errors"));
    }

    #[test]
    fn test_verbose_shows_cause_chain() {
        plain();
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = MeshError::io(io, Path::new("secret.txt"), "read");

        assert!(!render_error(&err, false).contains("caused by"));
        assert!(render_error(&err, true).contains("caused by"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(2_500_000), "2.5 MB");
    }
}
