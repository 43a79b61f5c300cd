
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::DEFAULT_MAX_CHARS;

pub const CONFIG_FILE_NAME: &str = "nfl-rag.toml";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Root of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    /// Per-request timeout; requests wait indefinitely when unset
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-5.1-mini".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub corpus_dir: PathBuf,
    pub index_dir: PathBuf,
    pub collection: String,
    pub batch_size: usize,
    pub max_chars: usize,
    /// File extensions treated as plain text, without the leading dot
    pub extensions: Vec<String>,
}

impl Default for IndexConfig {
    #[inline]
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("index/lancedb"),
            collection: "nfl_knowledge".to_string(),
            batch_size: 32,
            max_chars: DEFAULT_MAX_CHARS,
            extensions: vec!["txt".to_string()],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid API key variable: {0} (cannot be empty)")]
    InvalidApiKeyEnv(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be at least 1 second)")]
    InvalidTimeout(u64),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(usize),
    #[error("Invalid max chunk size: {0} (must be greater than 0)")]
    InvalidMaxChars(usize),
    #[error("Invalid collection name: {0:?} (use letters, digits, '_' or '-')")]
    InvalidCollection(String),
    #[error("At least one corpus file extension is required")]
    NoExtensions,
    #[error("Invalid file extension: {0:?}")]
    InvalidExtension(String),
}

impl Config {
    /// Load `nfl-rag.toml` from `base_dir`, falling back to defaults when it is absent.
    ///
    /// Relative corpus and index paths are resolved against `base_dir`.
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: base_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        Self::load_file(&config_path)
    }

    /// Load an explicit config file; its directory becomes the base directory
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.index.validate()?;
        Ok(())
    }

    /// Directory scanned for corpus documents
    #[inline]
    pub fn corpus_path(&self) -> PathBuf {
        self.base_dir.join(&self.index.corpus_dir)
    }

    /// Directory holding the LanceDB database
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join(&self.index.index_dir)
    }
}

impl ProviderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        if !(1..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(0));
        }

        Ok(())
    }

    /// API root with a trailing slash so relative endpoint paths join beneath it
    #[inline]
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{}/", trimmed))
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))
    }

    /// Read the API key from the environment; a missing key is not an error here
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl IndexConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.max_chars == 0 {
            return Err(ConfigError::InvalidMaxChars(self.max_chars));
        }

        if self.collection.is_empty()
            || !self
                .collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        if let Some(ext) = self
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.contains('/'))
        {
            return Err(ConfigError::InvalidExtension(ext.clone()));
        }

        Ok(())
    }
}
