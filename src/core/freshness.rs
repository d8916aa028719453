//! Cache freshness decision
//!
//! Decides whether a cached installation token can be handed out again or a
//! new one has to be fetched. The decision is a pure function of the cache
//! contents, the current credential fingerprint, the force flag and "now".

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use crate::core::cache::CacheSnapshot;
use crate::error::{Result, TokenError};

/// Lead time before the real expiry at which a token is treated as expired
pub const FRESHNESS_MARGIN_MINUTES: i64 = 5;

/// Why a refresh is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// No cached token
    MissingToken,
    /// Private key differs from the one the cached token was obtained with
    CredentialChanged,
    /// No cached expiry
    MissingExpiry,
    /// Cached token expires within the margin or has already expired
    ExpiringSoon,
    /// Caller asked for a new token
    Forced,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RefreshReason::MissingToken => "no cached token",
            RefreshReason::CredentialChanged => "private key changed",
            RefreshReason::MissingExpiry => "no cached expiry",
            RefreshReason::ExpiringSoon => "token expired or about to expire",
            RefreshReason::Forced => "refresh forced",
        };
        f.write_str(reason)
    }
}

/// Outcome of the freshness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Cached token is still good
    Reuse { expires_at: DateTime<Utc> },
    /// A new token is needed, for every listed reason
    Refresh(Vec<RefreshReason>),
}

impl Freshness {
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Freshness::Refresh(_))
    }
}

/// Decide between reusing the cached token and refreshing it.
///
/// `expiry_path` is only used to point at the corrupted file in the error.
///
/// ## Errors
///
/// - `CacheCorruption` - the cached expiry is non-empty but not a valid
///   timestamp. This is checked before anything else, so a corrupted expiry
///   is reported even when another reason would force a refresh anyway.
pub fn decide(
    snapshot: &CacheSnapshot,
    current_fingerprint: &str,
    force_refresh: bool,
    now: DateTime<Utc>,
    expiry_path: &Path,
) -> Result<Freshness> {
    let expires_at = parse_cached_expiry(&snapshot.expires_at, expiry_path)?;

    let mut reasons = Vec::new();

    if snapshot.token.is_empty() {
        reasons.push(RefreshReason::MissingToken);
    }

    if snapshot.fingerprint != current_fingerprint {
        tracing::debug!(
            cached = %snapshot.fingerprint,
            current = %current_fingerprint,
            "credential fingerprint changed"
        );
        reasons.push(RefreshReason::CredentialChanged);
    }

    match expires_at {
        None => reasons.push(RefreshReason::MissingExpiry),
        Some(expires_at) if is_expiring(expires_at, now) => {
            reasons.push(RefreshReason::ExpiringSoon)
        }
        Some(_) => {}
    }

    if force_refresh {
        reasons.push(RefreshReason::Forced);
    }

    for reason in &reasons {
        tracing::debug!(%reason, "refresh required");
    }

    match (reasons.is_empty(), expires_at) {
        (true, Some(expires_at)) => Ok(Freshness::Reuse { expires_at }),
        _ => Ok(Freshness::Refresh(reasons)),
    }
}

/// True when `now + margin` is past the expiry
pub fn is_expiring(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + Duration::minutes(FRESHNESS_MARGIN_MINUTES) > expires_at
}

fn parse_cached_expiry(raw: &str, path: &Path) -> Result<Option<DateTime<Utc>>> {
    if raw.is_empty() {
        return Ok(None);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| TokenError::CacheCorruption {
            path: path.to_path_buf(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
