//! Cache CLI command handlers

use crate::cli::commands::{AppArgs, CacheCommand};
use crate::core::token_manager::mask_token;
use crate::core::{CacheStore, Freshness, TokenManager};
use crate::error::Result;

/// Handle cache commands
pub fn handle_cache(args: &AppArgs, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Status => handle_status(args),
        CacheCommand::Clear => handle_clear(args),
        CacheCommand::Path => handle_path(args),
    }
}

/// Handle the status command
fn handle_status(args: &AppArgs) -> Result<()> {
    let settings = args.settings()?;
    let manager = TokenManager::from_settings(&settings)?;
    let status = manager.status()?;

    println!("Cache directory: {}", manager.cache().dir().display());

    if status.snapshot.token.is_empty() {
        println!("Token:           (none)");
    } else {
        println!("Token:           {}", mask_token(&status.snapshot.token));
    }

    if status.snapshot.expires_at.is_empty() {
        println!("Expires at:      (none)");
    } else {
        println!("Expires at:      {}", status.snapshot.expires_at);
    }

    println!(
        "Private key:     {}",
        if status.fingerprint_matches {
            "matches cached token"
        } else {
            "differs from cached token"
        }
    );

    match status.freshness {
        Freshness::Reuse { .. } => println!("\n✓ Cached token will be reused."),
        Freshness::Refresh(reasons) => {
            let reasons: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
            println!("\n→ Next run will fetch a new token ({}).", reasons.join(", "));
        }
    }

    Ok(())
}

/// Handle the clear command
fn handle_clear(args: &AppArgs) -> Result<()> {
    let settings = args.settings()?;
    let cache = CacheStore::new(&settings.cache_dir);
    cache.clear()?;
    println!("✓ Token cache cleared.");
    Ok(())
}

/// Handle the path command
fn handle_path(args: &AppArgs) -> Result<()> {
    let settings = args.settings()?;
    println!("{}", settings.cache_dir.display());
    Ok(())
}
