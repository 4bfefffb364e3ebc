//! `contextmesh` is the primary CLI binary.

use clap::Parser;
use contextmesh_cli::format::render_error;
use contextmesh_cli::handlers;
use contextmesh_cli::{Cli, Command, MeshResult};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_tracing(verbose);

    if let Err(e) = run(cli).await {
        let e = e.classify();
        tracing::debug!(kind = %e.kind(), "command failed");
        eprintln!();
        eprint!("{}", render_error(&e, verbose));
        eprintln!();
        std::process::exit(e.exit_code());
    }
}

/// Initialize tracing. Only enables logging when RUST_LOG is set or `--verbose` is passed.
fn init_tracing(verbose: bool) {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    // Without a subscriber, all tracing events are discarded.
    if !rust_log_set && !verbose {
        return;
    }

    let env_filter = if rust_log_set {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("contextmesh_cli=debug")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> MeshResult<()> {
    match cli.command {
        Command::Publish {
            path,
            registry,
            token,
            dry_run,
        } => handlers::publish_connector(path, registry, token, dry_run, cli.verbose).await,
        Command::Validate { path, strict, json } => {
            handlers::validate_connector(path, strict, json).await
        }
        Command::Init { path } => handlers::init_connector(path).await,
    }
}
