//! Text grouping CLI
//!
//! Groups pages and notes by embedding similarity.
//!
//! # Usage
//!
//! ```bash
//! grouping replay --input items.jsonl [--provider hashing] [--threshold 0.4]
//! grouping calibrate --input items.jsonl --expected groups.json
//! grouping config
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/text-grouping/config.toml)
//! 3. Environment variables (GROUPING_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use grouping_cli::{handle_calibrate, handle_replay, show_config, Cli, Commands, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            provider,
            threshold,
        } => {
            let overrides = Overrides {
                log_level: cli.log_level,
                provider,
                threshold,
            };
            handle_replay(cli.config.as_deref(), &input, overrides).await?;
        }
        Commands::Calibrate {
            input,
            expected,
            provider,
            threshold,
        } => {
            let overrides = Overrides {
                log_level: cli.log_level,
                provider,
                threshold,
            };
            handle_calibrate(cli.config.as_deref(), &input, &expected, overrides).await?;
        }
        Commands::Config => {
            let overrides = Overrides {
                log_level: cli.log_level,
                ..Default::default()
            };
            show_config(cli.config.as_deref(), overrides)?;
        }
    }

    Ok(())
}
