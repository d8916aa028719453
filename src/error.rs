//! Custom error types for github-token
//!
//! Every failure is fatal to the invocation. Errors bubble up to `main`,
//! which prints them and exits with the code from [`TokenError::exit_code`].

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the github-token application
#[derive(Error, Debug)]
pub enum TokenError {
    /// Missing or invalid configuration (identity fields, config file, flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// Private key could not be used to sign the app JWT
    #[error("Failed to sign GitHub App JWT: {0}\n\n  → Make sure the private key is the PEM file downloaded from the GitHub App settings.")]
    Signing(String),

    /// GitHub rejected the token exchange or returned something unexpected
    #[error("Failed to fetch installation access token: {0}")]
    Fetch(String),

    /// Transport-level failure talking to GitHub
    #[error("Network request failed: {0}\n\n  → Check your internet connection and --api-url.")]
    Network(#[from] reqwest::Error),

    /// Filesystem failure on a cache slot
    #[error("Cache operation failed on '{}': {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached expiry is present but not a valid timestamp
    #[error("Cached token expiry '{value}' in '{}' is corrupted: {reason}\n\n  → Run 'github-token cache clear' to reset the cache.", .path.display())]
    CacheCorruption {
        path: PathBuf,
        value: String,
        reason: String,
    },
}

impl TokenError {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            TokenError::Config(_) | TokenError::Toml(_) => 2,
            TokenError::Signing(_) => 3,
            TokenError::Fetch(_) | TokenError::Network(_) => 4,
            TokenError::CacheIo { .. } => 5,
            TokenError::CacheCorruption { .. } => 6,
        }
    }

    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TokenError::CacheIo {
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for TokenError {
    fn from(err: toml::de::Error) -> Self {
        TokenError::Toml(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        TokenError::Signing(err.to_string())
    }
}

/// Result type alias using TokenError
pub type Result<T> = std::result::Result<T, TokenError>;
