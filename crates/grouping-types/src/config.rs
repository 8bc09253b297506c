//! Configuration loading for text grouping.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/text-grouping/config.toml`
//! (platform equivalent via `directories`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::GroupingError;

/// Similarity threshold used when nothing else is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.3105;

const APP_NAME: &str = "text-grouping";

/// Settings consumed directly by the clustering engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum similarity for two items to share a cluster, in (0, 1).
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Embedding dimension every stored vector must have.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            dimension: default_dimension(),
        }
    }
}

impl EngineConfig {
    /// Create an engine configuration.
    pub fn new(threshold: f32, dimension: usize) -> Self {
        Self {
            threshold,
            dimension,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            ));
        }
        if self.dimension == 0 {
            return Err("dimension must be > 0".to_string());
        }
        Ok(())
    }
}

/// Which embedding provider backs the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// BERT sentence embeddings through Candle (default)
    #[default]
    Candle,
    /// Model-free feature hashing
    Hashing,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Candle => write!(f, "candle"),
            ProviderKind::Hashing => write!(f, "hashing"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "candle" => Ok(ProviderKind::Candle),
            "hashing" => Ok(ProviderKind::Hashing),
            other => Err(format!("unknown embedding provider: {}", other)),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider backing the engine
    #[serde(default)]
    pub provider: ProviderKind,

    /// HuggingFace repository of the sentence embedding model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Directory where model files are cached
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Embedding dimension produced by the provider
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum number of tokens fed to the model, special tokens included
    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model_repo: default_model_repo(),
            cache_dir: default_cache_dir(),
            dimension: default_dimension(),
            max_seq_length: default_max_seq_length(),
        }
    }
}

impl EmbeddingSettings {
    /// Model cache directory with a leading `~/` expanded to the home directory.
    pub fn expanded_cache_dir(&self) -> PathBuf {
        if let Some(rest) = self.cache_dir.strip_prefix("~/") {
            if let Some(home) = home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.cache_dir)
    }
}

/// Host session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// URL hosts whose pages are embedded from the title alone
    #[serde(default = "default_title_only_hosts")]
    pub title_only_hosts: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            title_only_hosts: default_title_only_hosts(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Initial similarity threshold
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Host session configuration
    #[serde(default)]
    pub session: SessionSettings,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_dimension() -> usize {
    384
}

fn default_max_seq_length() -> usize {
    128
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_cache_dir() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("./models"))
        .to_string_lossy()
        .to_string()
}

fn home_dir() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_title_only_hosts() -> Vec<String> {
    vec!["youtube".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/text-grouping/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (GROUPING_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, GroupingError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("threshold", default_threshold() as f64)?
            .set_default("log_level", default_log_level())?
            .set_default("embedding.model_repo", default_model_repo())?
            .set_default("embedding.cache_dir", default_cache_dir())?
            .set_default("embedding.dimension", default_dimension() as i64)?
            .set_default("embedding.max_seq_length", default_max_seq_length() as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // GROUPING_THRESHOLD, GROUPING_EMBEDDING__PROVIDER, ...
        builder = builder.add_source(
            Environment::with_prefix("GROUPING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;

        settings.validate().map_err(GroupingError::InvalidSettings)?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.engine_config().validate()?;
        if self.embedding.max_seq_length == 0 {
            return Err("embedding.max_seq_length must be > 0".to_string());
        }
        Ok(())
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.threshold, self.embedding.dimension)
    }
}
