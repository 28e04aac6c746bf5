use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::{
    config::Config,
    embeddings::VoyageClient,
    pipeline::{IngestionPipeline, SearchPipeline},
    store::FileVectorStore,
    viewer::Viewer,
};

pub type AppIngestion = IngestionPipeline<VoyageClient, FileVectorStore>;
pub type AppSearch = SearchPipeline<VoyageClient, FileVectorStore>;

/// Builds the pipelines from configuration.
pub struct AppFactory;

impl AppFactory {
    pub fn load_config() -> Result<Config> {
        let base_path = Config::default_base_path()?;
        Self::load_config_from(base_path)
    }

    pub fn load_config_from(base_path: PathBuf) -> Result<Config> {
        Config::load_with(&base_path)
            .with_context(|| format!("Failed to load config from {}", base_path.display()))
    }

    /// Embedding client; fails without an API key.
    pub fn create_gateway(config: &Config) -> Result<VoyageClient> {
        let api_key = config.require_api_key()?;
        let embedding = &config.embedding;

        let client = VoyageClient::new(
            api_key,
            &embedding.base_url,
            &embedding.model,
            Duration::from_secs(embedding.timeout_secs),
        )
        .context("Failed to create embedding client")?;

        log::info!("Using embedding model: {}", client.model());
        Ok(client)
    }

    pub fn open_store(config: &Config) -> Result<FileVectorStore> {
        let path = config.store_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        FileVectorStore::open(&path)
            .with_context(|| format!("Failed to open record store {}", path.display()))
    }

    pub fn create_ingestion(config: &Config) -> Result<AppIngestion> {
        let gateway = Self::create_gateway(config)?;
        let store = Self::open_store(config)?;
        Ok(IngestionPipeline::new(gateway, store, config.encoder))
    }

    pub fn create_search(config: &Config) -> Result<AppSearch> {
        let gateway = Self::create_gateway(config)?;
        let store = Self::open_store(config)?;
        Ok(SearchPipeline::new(
            gateway,
            store,
            config.search.candidate_pool,
        ))
    }

    pub fn create_viewer(config: &Config) -> Result<Viewer> {
        Ok(Viewer::new(config.viewer.command.as_deref())?)
    }
}
