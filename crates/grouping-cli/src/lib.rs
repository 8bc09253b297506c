//! Grouping CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (replay, calibrate, config)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    build_provider, handle_calibrate, handle_replay, init_tracing, load_settings, read_expected,
    read_items, run_calibrate, run_replay, show_config, Overrides, ReplayStep,
};
