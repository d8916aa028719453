//! Installation access token exchange
//!
//! Trades an app JWT for an installation access token.
//! Format: https://docs.github.com/en/rest/apps/apps#create-an-installation-access-token-for-an-app

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, TokenError};

/// Default GitHub REST API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const GITHUB_API_VERSION: &str = "2022-11-28";

/// A short-lived installation access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Response body of the access token endpoint (extra fields are ignored)
#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client for the installation access token endpoint
pub struct TokenFetcher {
    client: Client,
    base_url: Url,
}

impl TokenFetcher {
    /// Create a fetcher for `base_url`, with every request bounded by `timeout`
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("github-token/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(client_setup_error)?;

        Ok(Self { client, base_url })
    }

    /// Full URL of the access token endpoint for an installation
    pub fn access_tokens_url(&self, installation_id: u64) -> Result<Url> {
        let id = installation_id.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TokenError::Config(format!("Invalid API URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["app", "installations", id.as_str(), "access_tokens"]);
        Ok(url)
    }

    /// Exchange `jwt` for an installation access token
    ///
    /// Single attempt, no retry. Anything but `201 Created` is an error.
    pub async fn fetch(&self, jwt: &str, installation_id: u64) -> Result<AccessToken> {
        let url = self.access_tokens_url(installation_id)?;
        tracing::info!(url = %url, "requesting installation access token");

        let response = self
            .client
            .post(url)
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = match response.text().await {
                Ok(body) => body.trim().to_string(),
                Err(e) => format!("<body unreadable: {}>", e),
            };
            return Err(TokenError::Fetch(format!(
                "GitHub returned {} (expected 201 Created): {}",
                status, body
            )));
        }

        let text = response.text().await?;
        let body: InstallationTokenResponse = serde_json::from_str(&text)
            .map_err(|e| TokenError::Fetch(format!("Invalid token response: {}", e)))?;

        if body.expires_at <= Utc::now() {
            return Err(TokenError::Fetch(format!(
                "GitHub returned a token that already expired at {}",
                body.expires_at
            )));
        }

        tracing::debug!(expires_at = %body.expires_at, "received installation access token");
        Ok(AccessToken {
            token: SecretString::from(body.token),
            expires_at: body.expires_at,
        })
    }
}

/// The HTTP client could not be built (TLS backend, system config); no request was sent
fn client_setup_error(err: reqwest::Error) -> TokenError {
    TokenError::Fetch(format!("Cannot set up HTTP client: {}", err))
}
