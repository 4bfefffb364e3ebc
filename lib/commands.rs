//! CLI command definitions.

use crate::constants::{DEFAULT_REGISTRY_URL, REGISTRY_TOKEN_ENV, REGISTRY_URL_ENV};
use crate::styles::styles;
use clap::{Parser, Subcommand};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PUBLISH_EXAMPLES: &str = examples![
    "contextmesh publish                       " # "Publish the connector in the current directory",
    "contextmesh publish ./weather             " # "Publish a specific directory",
    "contextmesh publish --dry-run             " # "Validate and pack without uploading",
    "contextmesh publish --token $TOKEN        " # "Pass the registry token explicitly",
    "contextmesh publish --registry http://localhost:8080" # "Publish to a local registry",
];

const VALIDATE_EXAMPLES: &str = examples![
    "contextmesh validate                      " # "Validate mcp.json in the current directory",
    "contextmesh validate ./weather            " # "Validate a specific directory",
    "contextmesh validate --strict             " # "Treat warnings as errors",
    "contextmesh validate --json               " # "JSON output for scripts",
];

const INIT_EXAMPLES: &str = examples![
    "contextmesh init                          " # "Create mcp.json in the current directory",
    "contextmesh init ./weather                " # "Create the directory and its mcp.json",
];

const CLI_EXAMPLES: &str = examples_section!["Getting started:";
    "contextmesh init                          " # "1. Create a default manifest",
    "contextmesh validate                      " # "2. Check it",
    "contextmesh publish --dry-run             " # "3. See what would be published",
    "contextmesh publish                       " # "4. Publish it",
];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// ContextMesh CLI - Publish MCP connectors.
#[derive(Debug, Parser)]
#[command(name = "contextmesh", author, version, styles=styles())]
#[command(about = "Validate, pack and publish MCP connectors", after_help = CLI_EXAMPLES)]
pub struct Cli {
    /// Show every validation error and the full cause chain.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate, pack and upload a connector to the registry.
    #[command(after_help = PUBLISH_EXAMPLES)]
    Publish {
        /// Connector directory (defaults to current directory).
        path: Option<String>,

        /// Registry URL.
        #[arg(long, env = REGISTRY_URL_ENV, default_value = DEFAULT_REGISTRY_URL)]
        registry: String,

        /// Registry token.
        #[arg(long, env = REGISTRY_TOKEN_ENV, hide_env_values = true)]
        token: Option<String>,

        /// Validate and pack without uploading.
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a connector manifest.
    #[command(after_help = VALIDATE_EXAMPLES)]
    Validate {
        /// Connector directory (defaults to current directory).
        path: Option<String>,

        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a default manifest if none exists.
    #[command(after_help = INIT_EXAMPLES)]
    Init {
        /// Connector directory (defaults to current directory).
        path: Option<String>,
    },
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_publish_flags() {
        let cli = Cli::try_parse_from([
            "contextmesh",
            "publish",
            "./weather",
            "--registry",
            "http://localhost:8080",
            "--token",
            "tok",
            "--dry-run",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Publish {
                path,
                registry,
                token,
                dry_run,
            } => {
                assert_eq!(path.as_deref(), Some("./weather"));
                assert_eq!(registry, "http://localhost:8080");
                assert_eq!(token.as_deref(), Some("tok"));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["contextmesh", "validate", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Validate {
                path: None,
                json: true,
                strict: false
            }
        ));
    }

    #[test]
    fn test_examples_render() {
        assert!(PUBLISH_EXAMPLES.starts_with("Examples:\n  contextmesh publish"));
        assert!(CLI_EXAMPLES.contains("# 4. Publish it"));
    }
}
