//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Walk-session tracker.
///
/// Turns a stream of location fixes into timed walks with distance, pace and
/// calories, and stores each finished walk locally and (optionally) on a
/// REST backend.
#[derive(Debug, Parser)]
#[command(name = "walk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track a walk live from a JSON-lines location feed on stdin.
    ///
    /// A session starts immediately (unless --wait is given) and stops at
    /// end of input or on a `stop` entry.
    Track {
        /// Wait for a `start` entry instead of starting right away.
        #[arg(long)]
        wait: bool,

        /// Output finished sessions as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Replay a recorded location feed with ticks derived from its
    /// timestamps.
    Replay {
        /// JSON-lines feed file.
        file: PathBuf,

        /// Output finished sessions as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recorded walks, newest first.
    History {
        /// Maximum number of walks to show.
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and lifetime totals.
    Status,
}
