//! Installation token lifecycle
//!
//! Handles:
//! - Reading the cached token and deciding whether it is still fresh
//! - Signing an app JWT and exchanging it when a refresh is needed
//! - Writing the new token back to the cache
//!
//! One decision per invocation, at most one network call.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::core::cache::{CacheSnapshot, CacheStore};
use crate::core::config::{AppIdentity, Settings};
use crate::core::fingerprint::credential_fingerprint;
use crate::core::freshness::{self, Freshness};
use crate::error::Result;
use crate::github::{sign_app_jwt, TokenFetcher};

/// Where an issued token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cache,
    Fetched,
}

/// A token ready to hand to the caller
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub source: TokenSource,
}

/// Cache state as seen by the freshness check, without refreshing
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub snapshot: CacheSnapshot,
    pub fingerprint_matches: bool,
    pub freshness: Freshness,
}

/// Token manager for one GitHub App installation
pub struct TokenManager {
    identity: AppIdentity,
    cache: CacheStore,
    fetcher: TokenFetcher,
}

impl TokenManager {
    pub fn new(identity: AppIdentity, cache: CacheStore, fetcher: TokenFetcher) -> Self {
        Self {
            identity,
            cache,
            fetcher,
        }
    }

    /// Build a manager from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let identity = settings.identity()?;
        let cache = CacheStore::new(&settings.cache_dir);
        let fetcher = TokenFetcher::new(settings.api_url.clone(), settings.timeout)?;
        Ok(Self::new(identity, cache, fetcher))
    }

    /// Get a valid installation token, refreshing if necessary
    ///
    /// ## Errors
    ///
    /// - `CacheIo` - a cache slot could not be read or written
    /// - `CacheCorruption` - the cached expiry is not a timestamp
    /// - `Signing` - the private key could not sign the app JWT
    /// - `Fetch` / `Network` - the token exchange failed
    pub async fn get_token(&self, force_refresh: bool) -> Result<IssuedToken> {
        self.cache.ensure_dir()?;
        let snapshot = self.cache.read()?;
        let fingerprint = credential_fingerprint(&self.identity.private_key);

        let decision = freshness::decide(
            &snapshot,
            &fingerprint,
            force_refresh,
            Utc::now(),
            &self.cache.expiry_path(),
        )?;

        match decision {
            Freshness::Reuse { expires_at } => {
                tracing::info!(%expires_at, "using cached token");
                Ok(IssuedToken {
                    token: SecretString::from(snapshot.token),
                    expires_at,
                    source: TokenSource::Cache,
                })
            }
            Freshness::Refresh(reasons) => {
                tracing::info!(reasons = ?reasons, "fetching new token");
                self.refresh(&snapshot, &fingerprint).await
            }
        }
    }

    /// Report what `get_token` would do, without any network call or write
    pub fn status(&self) -> Result<CacheStatus> {
        let snapshot = self.cache.read()?;
        let fingerprint = credential_fingerprint(&self.identity.private_key);
        let freshness = freshness::decide(
            &snapshot,
            &fingerprint,
            false,
            Utc::now(),
            &self.cache.expiry_path(),
        )?;

        Ok(CacheStatus {
            fingerprint_matches: snapshot.fingerprint == fingerprint,
            snapshot,
            freshness,
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    async fn refresh(&self, previous: &CacheSnapshot, fingerprint: &str) -> Result<IssuedToken> {
        let jwt = sign_app_jwt(&self.identity, Utc::now())?;
        let access_token = self
            .fetcher
            .fetch(&jwt, self.identity.installation_id)
            .await?;

        self.cache.write_token(access_token.token.expose_secret())?;
        self.cache.write_expiry(access_token.expires_at)?;

        if previous.fingerprint != fingerprint {
            self.cache.write_fingerprint(fingerprint)?;
        }

        Ok(IssuedToken {
            token: access_token.token,
            expires_at: access_token.expires_at,
            source: TokenSource::Fetched,
        })
    }
}

/// Get a masked version of a token for display (shows first 4 and last 4 chars)
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
