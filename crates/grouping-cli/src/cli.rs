//! CLI argument parsing for the grouping tool.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use grouping_types::ProviderKind;

/// Text grouping
///
/// Groups pages and notes by embedding similarity and tunes the grouping
/// threshold from a reference grouping.
#[derive(Parser, Debug)]
#[command(name = "grouping")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/text-grouping/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Grouping commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add items from a JSON Lines file one by one, printing the groups after each
    Replay {
        /// Items file, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Embedding provider (candle, hashing)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Override the similarity threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Add all items, then tune the threshold to reproduce an expected grouping
    Calibrate {
        /// Items file, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Expected grouping: JSON array of arrays of item ids
        #[arg(short, long)]
        expected: PathBuf,

        /// Embedding provider (candle, hashing)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Override the starting similarity threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Print the effective configuration as TOML
    Config,
}
