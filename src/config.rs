use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{embeddings, images::EncodeLimits, store};

const CONFIG_FILE: &str = "config.yaml";
const STORE_FILE: &str = "records.bin";

const DEFAULT_IMAGES_DIR: &str = "./my_pictures";
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Results shown by `search` when no limit is given: the best match only
const DEFAULT_SEARCH_LIMIT: usize = 1;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("could not determine home directory: {0}")]
    NoHomeDir(String),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Connection settings for the embedding service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Usually supplied through VOYAGE_API_KEY instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    embeddings::DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Defaults to records.bin in the base directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidates considered by the index per query
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_pool: store::DEFAULT_CANDIDATE_POOL,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

fn default_candidate_pool() -> usize {
    store::DEFAULT_CANDIDATE_POOL
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Program used to open the best match; platform opener if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub encoder: EncodeLimits,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
            embedding: EmbeddingConfig::default(),
            encoder: EncodeLimits::default(),
            store: StoreConfig::default(),
            search: SearchConfig::default(),
            viewer: ViewerConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGES_DIR)
}

impl Config {
    /// Base directory: PICSEARCH_BASE_DIR or ~/.local/share/picsearch
    pub fn default_base_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("PICSEARCH_BASE_DIR") {
            return Ok(PathBuf::from(path));
        }

        let home = homedir::my_home()
            .map_err(|e| ConfigError::NoHomeDir(format!("{e:?}")))?
            .ok_or_else(|| ConfigError::NoHomeDir("home directory path is empty".to_string()))?;
        Ok(home.join(".local/share/picsearch"))
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if
    /// missing, then apply environment overrides and validate.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(base_path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env(
        base_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;

        let config_path = base_path.join(CONFIG_FILE);
        if !config_path.exists() {
            log::info!("Creating default config at {}", config_path.display());
            write_atomic(&config_path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&config_path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();

        config.apply_env(env);
        config.validate()?;

        Ok(config)
    }

    /// Environment variables take precedence over the config file.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = non_empty("VOYAGE_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(model) = non_empty("VOYAGE_MODEL") {
            self.embedding.model = model;
        }
        if let Some(base_url) = non_empty("VOYAGE_BASE_URL") {
            self.embedding.base_url = base_url;
        }
        if let Some(dir) = non_empty("IMAGES_DIR") {
            self.images_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty("PICSEARCH_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.embedding.base_url)
            .map_err(|e| ConfigError::invalid("embedding.base_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "embedding.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::invalid("embedding.model", "must not be empty"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "embedding.timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.encoder.max_pixels == 0 {
            return Err(ConfigError::invalid("encoder.max_pixels", "must be greater than 0"));
        }

        if self.encoder.max_bytes == 0 {
            return Err(ConfigError::invalid("encoder.max_bytes", "must be greater than 0"));
        }

        if self.search.limit == 0 {
            return Err(ConfigError::invalid("search.limit", "must be at least 1"));
        }

        if self.search.candidate_pool < self.search.limit {
            return Err(ConfigError::invalid(
                "search.candidate_pool",
                format!(
                    "must be at least search.limit ({}), got {}",
                    self.search.limit, self.search.candidate_pool
                ),
            ));
        }

        Ok(())
    }

    /// The API key, required before talking to the embedding service.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.embedding
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingField("embedding.api_key (or VOYAGE_API_KEY)"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| self.base_path.join(STORE_FILE))
    }

    /// YAML rendering with the API key masked.
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.embedding.api_key.is_some() {
            shown.embedding.api_key = Some("********".to_string());
        }
        Ok(serde_yml::to_string(&shown)?)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, data)?;
    std::fs::rename(&temp_path, path)
}
