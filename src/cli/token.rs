//! Token CLI command handler

use secrecy::ExposeSecret;

use crate::cli::commands::AppArgs;
use crate::core::{TokenManager, TokenSource};
use crate::error::Result;

/// Print a valid installation token to stdout
///
/// Only the token goes to stdout, so the output can be captured directly:
/// `GH_TOKEN=$(github-token)`.
pub async fn handle_token(args: &AppArgs, force_refresh: bool) -> Result<()> {
    let settings = args.settings()?;
    let manager = TokenManager::from_settings(&settings)?;

    let issued = manager.get_token(force_refresh).await?;
    if issued.source == TokenSource::Fetched {
        tracing::debug!(expires_at = %issued.expires_at, "cached new token");
    }

    println!("{}", issued.token.expose_secret());
    Ok(())
}
