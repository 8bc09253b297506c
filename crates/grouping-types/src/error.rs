//! Error types shared across the grouping workspace.

use thiserror::Error;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum GroupingError {
    /// A configuration source could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Settings loaded but hold values the engine cannot run with
    #[error("Invalid configuration: {0}")]
    InvalidSettings(String),
}
