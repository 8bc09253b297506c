//! On-disk model store.
//!
//! Each model repository gets its own directory under the cache root holding
//! the three files the BERT embedder needs. Missing files are fetched from
//! HuggingFace Hub; files already present are never fetched again.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default sentence embedding model
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// A file the embedder loads from the model directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFile {
    Config,
    Tokenizer,
    Weights,
}

impl ModelFile {
    /// Every file a model directory must hold.
    pub const ALL: [ModelFile; 3] = [ModelFile::Config, ModelFile::Tokenizer, ModelFile::Weights];

    /// File name inside the repository.
    pub fn file_name(self) -> &'static str {
        match self {
            ModelFile::Config => "config.json",
            ModelFile::Tokenizer => "tokenizer.json",
            ModelFile::Weights => "model.safetensors",
        }
    }
}

/// Resolved locations of a model's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(ModelFile::Config.file_name()),
            tokenizer: dir.join(ModelFile::Tokenizer.file_name()),
            weights: dir.join(ModelFile::Weights.file_name()),
        }
    }

    /// Path of one model file.
    pub fn get(&self, file: ModelFile) -> &Path {
        match file {
            ModelFile::Config => &self.config,
            ModelFile::Tokenizer => &self.tokenizer,
            ModelFile::Weights => &self.weights,
        }
    }
}

/// Model directory for one repository under a cache root.
#[derive(Debug, Clone)]
pub struct ModelCache {
    root: PathBuf,
    repo: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("text-grouping")
            .join("models");
        Self::new(root, DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(root: impl Into<PathBuf>, repo: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            repo: repo.into(),
        }
    }

    /// Cache root shared by all repositories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// HuggingFace repository id, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Directory holding this repository's files; `/` in the id becomes `_`.
    pub fn model_dir(&self) -> PathBuf {
        self.root.join(self.repo.replace('/', "_"))
    }

    /// Where the model files live, whether or not they exist yet.
    pub fn paths(&self) -> ModelPaths {
        ModelPaths::in_dir(&self.model_dir())
    }

    /// Files not yet present on disk.
    pub fn missing(&self) -> Vec<ModelFile> {
        let paths = self.paths();
        ModelFile::ALL
            .into_iter()
            .filter(|f| !paths.get(*f).exists())
            .collect()
    }

    /// Make sure every model file is on disk, fetching the missing ones.
    pub fn ensure(&self) -> Result<ModelPaths, EmbeddingError> {
        let missing = self.missing();
        if missing.is_empty() {
            debug!(dir = ?self.model_dir(), "Model files cached");
        } else {
            info!(repo = %self.repo, files = missing.len(), "Fetching model files");
            self.fetch(&missing)?;
        }
        Ok(self.paths())
    }

    fn fetch(&self, files: &[ModelFile]) -> Result<(), EmbeddingError> {
        use hf_hub::api::sync::Api;

        let download_error = |reason: String| EmbeddingError::Download {
            repo: self.repo.clone(),
            reason,
        };

        let api = Api::new().map_err(|e| download_error(e.to_string()))?;
        let repo = api.model(self.repo.clone());
        std::fs::create_dir_all(self.model_dir())?;

        let paths = self.paths();
        for &file in files {
            let name = file.file_name();
            let fetched = repo
                .get(name)
                .map_err(|e| download_error(format!("{}: {}", name, e)))?;
            std::fs::copy(&fetched, paths.get(file))?;
            debug!(file = name, "Model file stored");
        }
        Ok(())
    }
}
