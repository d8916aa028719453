//! github-token - GitHub App installation tokens
//!
//! Prints a valid installation access token for a GitHub App.
//! Use the `cache` subcommands to inspect or reset the local token cache.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use github_token::cli::commands::{Cli, Commands};
use github_token::cli::{cache, token};
use github_token::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the token
    let filter = if cli.debug {
        EnvFilter::new("github_token=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => token::handle_token(&cli.app, cli.force_refresh).await,
        Some(Commands::Cache(args)) => cache::handle_cache(&cli.app, args.command),
    }
}
