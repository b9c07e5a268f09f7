//! Walk tracker CLI library.
//!
//! This crate provides the CLI interface for the walk tracker: feed
//! ingestion, the binary's persistence and artifact collaborators, and the
//! subcommands.

mod cli;
pub mod commands;
mod config;
pub mod feed;
pub mod snapshot;
pub mod store;
pub mod summary;

pub use cli::{Cli, Commands};
pub use config::Config;
