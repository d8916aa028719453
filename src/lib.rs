//! github-token - GitHub App installation tokens
//!
//! This library signs GitHub App JWTs, exchanges them for installation access
//! tokens, and caches the result on disk so repeated calls stay offline while
//! the cached token is fresh.

pub mod cli;
pub mod core;
pub mod error;
pub mod github;

pub use error::{Result, TokenError};
