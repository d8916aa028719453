//! Credential fingerprinting
//!
//! The cache stores a digest of the private key instead of the key itself so
//! that a rotated key invalidates the cached token.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of the private key PEM
pub fn credential_fingerprint(private_key: &SecretString) -> String {
    let digest = Sha256::digest(private_key.expose_secret().as_bytes());
    hex::encode(digest)
}
