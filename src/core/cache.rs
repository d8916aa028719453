//! Local filesystem cache for the last issued installation token
//!
//! The cache directory holds three plain-text slots:
//! - `token.txt` - the installation access token
//! - `token-expiry.txt` - its expiry as an RFC 3339 UTC timestamp
//! - `hash.txt` - the fingerprint of the private key used to obtain it
//!
//! A missing or empty slot reads as an empty string. Writes go through a
//! temporary file in the same directory followed by a rename.
//!
//! ## Known limitation
//!
//! There is no locking. Two invocations sharing the same cache directory can
//! interleave their reads and writes; the last writer wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;

use crate::error::{Result, TokenError};

const TOKEN_FILE: &str = "token.txt";
const EXPIRY_FILE: &str = "token-expiry.txt";
const FINGERPRINT_FILE: &str = "hash.txt";

/// Raw cache contents; empty strings mean "absent"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub token: String,
    pub expires_at: String,
    pub fingerprint: String,
}

/// Slot-per-file cache store rooted at a directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn expiry_path(&self) -> PathBuf {
        self.dir.join(EXPIRY_FILE)
    }

    /// Create the cache directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir).map_err(|e| TokenError::cache_io(&self.dir, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| TokenError::cache_io(&self.dir, e))?;
        }

        Ok(())
    }

    /// Read all three slots
    pub fn read(&self) -> Result<CacheSnapshot> {
        Ok(CacheSnapshot {
            token: self.read_slot(TOKEN_FILE)?,
            expires_at: self.read_slot(EXPIRY_FILE)?,
            fingerprint: self.read_slot(FINGERPRINT_FILE)?,
        })
    }

    pub fn write_token(&self, token: &str) -> Result<()> {
        self.write_slot(TOKEN_FILE, token)
    }

    pub fn write_expiry(&self, expires_at: DateTime<Utc>) -> Result<()> {
        self.write_slot(EXPIRY_FILE, &format_expiry(expires_at))
    }

    pub fn write_fingerprint(&self, fingerprint: &str) -> Result<()> {
        self.write_slot(FINGERPRINT_FILE, fingerprint)
    }

    /// Remove every slot; slots that are already gone are ignored
    pub fn clear(&self) -> Result<()> {
        for name in [TOKEN_FILE, EXPIRY_FILE, FINGERPRINT_FILE] {
            let path = self.dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(TokenError::cache_io(path, e)),
            }
        }
        Ok(())
    }

    fn read_slot(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(strip_line_ending(&contents).to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(TokenError::cache_io(path, e)),
        }
    }

    fn write_slot(&self, name: &str, value: &str) -> Result<()> {
        let path = self.dir.join(name);

        // NamedTempFile is created 0600 on Unix, and the rename keeps that mode
        let mut file =
            NamedTempFile::new_in(&self.dir).map_err(|e| TokenError::cache_io(&path, e))?;
        file.write_all(value.as_bytes())
            .map_err(|e| TokenError::cache_io(&path, e))?;
        file.persist(&path)
            .map_err(|e| TokenError::cache_io(&path, e.error))?;

        tracing::debug!(slot = name, "wrote cache slot");
        Ok(())
    }
}

/// Drop one trailing `\n` or `\r\n` left by editors or `echo`; nothing else
fn strip_line_ending(contents: &str) -> &str {
    contents
        .strip_suffix("\r\n")
        .or_else(|| contents.strip_suffix('\n'))
        .unwrap_or(contents)
}

/// Canonical on-disk representation of a token expiry
pub fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
