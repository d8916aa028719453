//! GitHub API integration module
//!
//! This module provides the GitHub App side of token issuance:
//! - App JWT signing
//! - Installation access token exchange

pub mod client;
pub mod jwt;

pub use client::{AccessToken, TokenFetcher, DEFAULT_API_URL};
pub use jwt::sign_app_jwt;
