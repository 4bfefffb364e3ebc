//! Publish command handler.

use colored::Colorize;

use super::common::resolve_dir;
use crate::error::MeshResult;
use crate::format::{format_size, render_warning};
use crate::publish::{PublishOptions, PublishOutcome, PublishReport, publish};
use crate::retry::RetryOptions;
use crate::styles::Spinner;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Publish the connector at `path` to `registry`.
pub async fn publish_connector(
    path: Option<String>,
    registry: String,
    token: Option<String>,
    dry_run: bool,
    verbose: bool,
) -> MeshResult<()> {
    let dir = resolve_dir(path)?;

    println!();
    let spinner = Spinner::new(if dry_run {
        "Validating and packing"
    } else {
        "Publishing"
    });

    let notices = spinner.clone();
    let retry = RetryOptions::default().with_observer(move |event| {
        notices.println(format!(
            "    {} attempt {} failed: {} (retrying in {:.1}s)",
            "↻".bright_yellow(),
            event.attempt,
            event.error,
            event.delay.as_secs_f64()
        ));
    });

    let options = PublishOptions {
        registry_url: registry,
        token,
        dry_run,
        retry,
    };

    let report = match publish(&dir, &options).await {
        Ok(report) => {
            spinner.succeed(Some(if dry_run { "Packed" } else { "Published" }));
            report
        }
        Err(e) => {
            spinner.fail(None);
            return Err(e);
        }
    };

    print_report(&report, verbose);
    Ok(())
}

fn print_report(report: &PublishReport, verbose: bool) {
    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("{}", render_warning(warning));
        }
    }

    let stats = &report.stats;
    println!();
    println!(
        "  · Files: {} ({})",
        stats.file_count.to_string().bright_white(),
        format_size(stats.total_size)
    );
    println!(
        "  · Archive: {}",
        format_size(stats.compressed_size).bright_white()
    );

    if verbose && !stats.ignored_files.is_empty() {
        println!("  · Excluded:");
        for path in &stats.ignored_files {
            println!("      {}", path.dimmed());
        }
    }

    match &report.outcome {
        PublishOutcome::DryRun(summary) => {
            println!("  · Checksum: {}", summary.checksum.dimmed());
            println!();
            println!(
                "  {} Dry run complete. Would publish {}@{}",
                "✓".bright_green(),
                summary.id.bright_cyan(),
                summary.version.bright_white()
            );
            if !summary.tags.is_empty() {
                println!("    {}: {}", "tags".dimmed(), summary.tags.join(", "));
            }
        }
        PublishOutcome::Published(result) => {
            println!("  · Checksum: {}", result.checksum.dimmed());
            println!();
            println!(
                "  {} Published {}@{}",
                "✓".bright_green(),
                result.id.bright_cyan(),
                result.version.bright_white()
            );
        }
    }
}
