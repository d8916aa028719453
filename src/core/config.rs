//! Application configuration management
//!
//! Settings come from three layers, highest precedence first:
//! 1. Command-line flags and their environment variables (resolved by clap)
//! 2. The TOML config file (`--config`, or `config.toml` in the platform config dir)
//! 3. Built-in defaults
//!
//! All layers share the [`Config`] shape; [`Config::merge`] stacks them and
//! [`Settings::resolve`] validates the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TokenError};
use crate::github::DEFAULT_API_URL;

/// Default request timeout for the token exchange
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// GitHub App ID
    pub app_id: Option<u64>,
    /// Installation ID of the app on the target account
    pub installation_id: Option<u64>,
    /// Private key PEM contents
    pub private_key: Option<String>,
    /// Path to the private key PEM file
    pub private_key_path: Option<PathBuf>,
    /// GitHub REST API base URL
    pub api_url: Option<String>,
    /// Directory holding the token cache
    pub cache_dir: Option<PathBuf>,
    /// Token exchange timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load a config file.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise an empty layer is returned.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(TokenError::Config(format!(
                        "Config file '{}' does not exist",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match Self::config_path() {
                Ok(path) if path.is_file() => path,
                _ => return Ok(Config::default()),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|e| {
            TokenError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&contents)?;

        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Layer `self` over `fallback`; values set in `self` win
    pub fn merge(self, fallback: Config) -> Config {
        Config {
            app_id: self.app_id.or(fallback.app_id),
            installation_id: self.installation_id.or(fallback.installation_id),
            private_key: self.private_key.or(fallback.private_key),
            private_key_path: self.private_key_path.or(fallback.private_key_path),
            api_url: self.api_url.or(fallback.api_url),
            cache_dir: self.cache_dir.or(fallback.cache_dir),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
        }
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the default cache directory
    pub fn default_cache_dir() -> Result<PathBuf> {
        Ok(project_dirs()?.cache_dir().to_path_buf())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "github-token", "github-token")
        .ok_or_else(|| TokenError::Config("Could not determine home directory".into()))
}

/// Identity of the GitHub App installation tokens are issued for
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub app_id: u64,
    pub installation_id: u64,
    pub private_key: SecretString,
}

/// Validated runtime settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    app_id: Option<u64>,
    installation_id: Option<u64>,
    private_key: Option<SecretString>,
    private_key_path: Option<PathBuf>,
    pub api_url: Url,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
}

impl Settings {
    /// Validate a merged config and fill in defaults
    ///
    /// Identity fields are checked separately by [`Settings::identity`] so
    /// cache maintenance commands work without them.
    pub fn resolve(config: Config) -> Result<Self> {
        let raw_url = config.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let api_url = Url::parse(raw_url)
            .map_err(|e| TokenError::Config(format!("Invalid API URL '{}': {}", raw_url, e)))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(TokenError::Config(format!(
                "API URL '{}' must use http or https",
                raw_url
            )));
        }

        let cache_dir = match config.cache_dir {
            Some(dir) => dir,
            None => Config::default_cache_dir()?,
        };

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(TokenError::Config("Timeout must be at least 1 second".into()));
        }

        Ok(Self {
            app_id: config.app_id,
            installation_id: config.installation_id,
            private_key: config.private_key.map(SecretString::from),
            private_key_path: config.private_key_path,
            api_url,
            cache_dir,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Build the app identity, failing if any required field is missing
    ///
    /// A zero ID counts as missing. An inline private key takes precedence
    /// over `private_key_path`.
    pub fn identity(&self) -> Result<AppIdentity> {
        let app_id = self.app_id.filter(|id| *id != 0);
        let installation_id = self.installation_id.filter(|id| *id != 0);
        let inline_key = self
            .private_key
            .as_ref()
            .map(|k| k.expose_secret())
            .filter(|k| !k.trim().is_empty());

        let has_key = inline_key.is_some() || self.private_key_path.is_some();

        let (Some(app_id), Some(installation_id), true) = (app_id, installation_id, has_key)
        else {
            let missing: Vec<&str> = [
                (app_id.is_none(), "app-id"),
                (installation_id.is_none(), "app-installation-id"),
                (!has_key, "app-private-key"),
            ]
            .into_iter()
            .filter_map(|(is_missing, name)| is_missing.then_some(name))
            .collect();

            return Err(TokenError::Config(format!(
                "missing required settings: {}\n\n  → Pass them as flags, GITHUB_APP_* environment variables, or in the config file.",
                missing.join(", ")
            )));
        };

        let private_key = match (inline_key, &self.private_key_path) {
            (Some(key), _) => key.to_string(),
            (None, Some(path)) => read_private_key(path)?,
            (None, None) => String::new(),
        };

        Ok(AppIdentity {
            app_id,
            installation_id,
            private_key: SecretString::from(private_key),
        })
    }
}

fn read_private_key(path: &Path) -> Result<String> {
    let key = fs::read_to_string(path).map_err(|e| {
        TokenError::Config(format!(
            "Cannot read private key file '{}': {}",
            path.display(),
            e
        ))
    })?;

    if key.trim().is_empty() {
        return Err(TokenError::Config(format!(
            "Private key file '{}' is empty",
            path.display()
        )));
    }
    Ok(key)
}
