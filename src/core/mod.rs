//! Core functionality for github-token
//!
//! This module contains the token issuing logic:
//! - Application configuration
//! - Credential fingerprinting
//! - The on-disk token cache
//! - Cache freshness decisions
//! - Token lifecycle management

pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod freshness;
pub mod token_manager;

pub use cache::{CacheSnapshot, CacheStore};
pub use config::{AppIdentity, Config, Settings};
pub use freshness::{Freshness, RefreshReason};
pub use token_manager::{IssuedToken, TokenManager, TokenSource};
