//! CLI command definitions using clap
//!
//! Defines the command structure for the `github-token` CLI tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::config::{Config, Settings};
use crate::error::Result;

/// github-token - GitHub App installation tokens
///
/// Prints a valid installation access token for a GitHub App, reusing the
/// cached one while it has more than five minutes left.
#[derive(Parser, Debug)]
#[command(name = "github-token", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub app: AppArgs,

    /// Ignore the cached token and fetch a new one
    #[arg(short = 'f', long)]
    pub force_refresh: bool,

    /// Enable debug logging (written to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand to execute (omit to print a token)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// App identity and runtime settings shared by every command
#[derive(Args, Debug, Default)]
pub struct AppArgs {
    /// Config file (default: config.toml in the platform config directory)
    #[arg(long, env = "GITHUB_TOKEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// GitHub App ID
    #[arg(long, env = "GITHUB_APP_ID", global = true)]
    pub app_id: Option<u64>,

    /// GitHub App installation ID
    #[arg(long = "app-installation-id", env = "GITHUB_APP_INSTALLATION_ID", global = true)]
    pub installation_id: Option<u64>,

    /// GitHub App private key (PEM contents)
    #[arg(
        long = "app-private-key",
        env = "GITHUB_APP_PRIVATE_KEY",
        hide_env_values = true,
        global = true
    )]
    pub private_key: Option<String>,

    /// Path to the GitHub App private key PEM file
    #[arg(long = "app-private-key-path", env = "GITHUB_APP_PRIVATE_KEY_PATH", global = true)]
    pub private_key_path: Option<PathBuf>,

    /// GitHub API base URL (GitHub Enterprise: https://HOST/api/v3)
    #[arg(long, env = "GITHUB_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Directory for the token cache
    #[arg(long, env = "GITHUB_TOKEN_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Timeout for the token request, in seconds
    #[arg(long = "timeout", env = "GITHUB_TOKEN_TIMEOUT", global = true)]
    pub timeout_secs: Option<u64>,
}

impl AppArgs {
    /// Settings given on the command line or through the environment
    pub fn to_config(&self) -> Config {
        Config {
            app_id: self.app_id,
            installation_id: self.installation_id,
            private_key: self.private_key.clone(),
            private_key_path: self.private_key_path.clone(),
            api_url: self.api_url.clone(),
            cache_dir: self.cache_dir.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    /// Merge flags over the config file and validate
    pub fn settings(&self) -> Result<Settings> {
        let file = Config::load(self.config.as_deref())?;
        Settings::resolve(self.to_config().merge(file))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or reset the token cache
    Cache(CacheArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Cache commands
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show the cached token and whether it would be reused
    Status,
    /// Delete the cached token, expiry and fingerprint
    Clear,
    /// Print the cache directory
    Path,
}
