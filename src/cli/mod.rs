//! CLI module for github-token
//!
//! This module contains all CLI command definitions and handlers using clap.

pub mod cache;
pub mod commands;
pub mod token;

pub use commands::{Cli, Commands};
