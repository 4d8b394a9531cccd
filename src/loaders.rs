//! Model file resolution for inference backends.
//!
//! A backend is identified by a model reference and a tokenizer reference.
//! Each reference is either a local directory (as produced by
//! `save_pretrained`) or a Hugging Face Hub repository id, in which case the
//! file is downloaded into the local hub cache.
//!
//! ## Main Types
//!
//! - [`HfLoader`] - Hugging Face file loader with retry logic
//! - [`ModelRef`] - Local directory or hub repository
//! - [`BackendSpec`] - Model + tokenizer references for one backend
//! - [`ModelFiles`] - Resolved config, tokenizer and weight paths
//!
//! Hub downloads retry on lock acquisition failures, which happen when
//! several processes populate the same cache concurrently.

use std::path::{Path, PathBuf};

use anyhow::Context;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

const WEIGHT_CANDIDATES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub revision: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, revision: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
            filename: filename.into(),
        }
    }

    pub async fn load(&self) -> anyhow::Result<PathBuf> {
        let hf_api = hf_hub::api::tokio::ApiBuilder::new()
            .with_chunk_size(None)
            .build()?;
        let hf_repo = hf_api.repo(Repo::with_revision(
            self.repo.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        let max_retries = 3;
        let mut attempt = 0;
        loop {
            match hf_repo.get(self.filename.as_str()).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        // Exponential backoff
                        let wait_time = std::time::Duration::from_millis(100 * (1 << attempt));
                        tracing::debug!(
                            repo = %self.repo,
                            file = %self.filename,
                            attempt,
                            "hub cache locked, retrying"
                        );
                        tokio::time::sleep(wait_time).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow::Error::from(e)
                        .context(format!("failed to fetch {} from {}", self.filename, self.repo)));
                }
            }
        }
    }
}

/// Where a backend's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    Local(PathBuf),
    Hub(String),
}

impl ModelRef {
    /// An existing directory is a local model; anything else is a hub repo id.
    pub fn parse(reference: &str) -> Self {
        let path = Path::new(reference);
        if path.is_dir() {
            ModelRef::Local(path.to_path_buf())
        } else {
            ModelRef::Hub(reference.to_string())
        }
    }

    pub async fn resolve(&self, filename: &str, revision: &str) -> anyhow::Result<PathBuf> {
        match self {
            ModelRef::Local(dir) => {
                let path = dir.join(filename);
                anyhow::ensure!(path.is_file(), "{} not found in {:?}", filename, dir);
                Ok(path)
            }
            ModelRef::Hub(repo) => HfLoader::new(repo, revision, filename).load().await,
        }
    }

    /// Resolves the first of `candidates` that exists.
    pub async fn resolve_any(&self, candidates: &[&str], revision: &str) -> anyhow::Result<PathBuf> {
        let mut last_error = None;
        for candidate in candidates {
            match self.resolve(candidate, revision).await {
                Ok(path) => return Ok(path),
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(e.context(format!(
                "none of {candidates:?} available for {self}"
            ))),
            None => anyhow::bail!("no candidate files given for {self}"),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelRef::Local(dir) => write!(f, "{}", dir.display()),
            ModelRef::Hub(repo) => f.write_str(repo),
        }
    }
}

/// Model and tokenizer references for one inference backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub model: ModelRef,
    pub tokenizer: ModelRef,
    pub revision: String,
}

impl BackendSpec {
    /// The tokenizer falls back to the model reference when not given
    /// separately (quantized exports often ship without one).
    pub fn new(model: &str, tokenizer: Option<&str>, revision: &str) -> Self {
        Self {
            model: ModelRef::parse(model),
            tokenizer: ModelRef::parse(tokenizer.unwrap_or(model)),
            revision: revision.to_string(),
        }
    }

    pub async fn fetch(&self) -> anyhow::Result<ModelFiles> {
        let config = self.model.resolve("config.json", &self.revision).await?;
        let weights = self
            .model
            .resolve_any(&WEIGHT_CANDIDATES, &self.revision)
            .await?;
        let tokenizer = self
            .tokenizer
            .resolve("tokenizer.json", &self.revision)
            .await?;
        tracing::debug!(model = %self.model, ?weights, "backend files resolved");
        Ok(ModelFiles {
            config,
            tokenizer,
            weights,
        })
    }
}

/// Resolved on-disk files for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn read_config(&self) -> anyhow::Result<String> {
        std::fs::read_to_string(&self.config)
            .with_context(|| format!("failed to read config file {:?}", self.config))
    }

    pub fn is_safetensors(&self) -> bool {
        self.weights
            .extension()
            .is_some_and(|ext| ext == "safetensors")
    }
}

/// Loads a tokenizer with truncation and padding disabled, so oversized
/// input reaches the backend intact and can be rejected explicitly.
pub fn load_tokenizer(path: &Path) -> anyhow::Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load tokenizer {:?}: {}", path, e))?;
    tokenizer
        .with_truncation(None)
        .map_err(anyhow::Error::msg)?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}
