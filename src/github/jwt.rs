//! GitHub App JWT signing
//!
//! GitHub Apps authenticate as themselves with a short-lived RS256 JWT.
//! See: https://docs.github.com/en/apps/creating-github-apps/authenticating-with-a-github-app/generating-a-json-web-token-jwt-for-a-github-app

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::core::config::AppIdentity;
use crate::error::Result;

/// How far `iat` is backdated to tolerate clock drift
const CLOCK_SKEW_SECS: i64 = 60;

/// JWT lifetime counted from `iat`. GitHub rejects anything over 10 minutes.
const JWT_LIFETIME_MINUTES: i64 = 9;

/// JWT claims for GitHub App authentication
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppClaims {
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issuer - the GitHub App ID
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: u64, now: DateTime<Utc>) -> Self {
        let issued_at = now - Duration::seconds(CLOCK_SKEW_SECS);
        let expires_at = issued_at + Duration::minutes(JWT_LIFETIME_MINUTES);

        Self {
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: app_id.to_string(),
        }
    }
}

/// Sign an app JWT for `identity`, valid from shortly before `now`
///
/// ## Errors
///
/// - `Signing` - the private key is not a usable RSA PEM
pub fn sign_app_jwt(identity: &AppIdentity, now: DateTime<Utc>) -> Result<String> {
    let claims = AppClaims::new(identity.app_id, now);

    let key = EncodingKey::from_rsa_pem(identity.private_key.expose_secret().as_bytes())?;
    let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

    tracing::debug!(app_id = identity.app_id, exp = claims.exp, "signed app JWT");
    Ok(jwt)
}
