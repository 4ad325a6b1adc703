use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::llm::chat::{ChatModel, LanguageModel};
use crate::llm::compose::Composer;
use crate::llm::embeddings::{Embedder, HttpEmbedder};
use crate::pipeline::Pipeline;
use crate::search::enrich::Enricher;
use crate::search::retriever::Retriever;
use crate::search::store::{CatalogSource, EmbeddingStore};
use crate::search::supabase::SupabaseClient;
use crate::search::vector::{EmbeddingsExport, MemoryCatalog, MemoryEmbeddingStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn EmbeddingStore>,
    pub search_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let (store, catalog): (Arc<dyn EmbeddingStore>, Arc<dyn CatalogSource>) =
            match config.store.backend.as_str() {
                "supabase" => {
                    let client = Arc::new(SupabaseClient::new(
                        http_client.clone(),
                        config.store.clone(),
                    ));
                    let store: Arc<dyn EmbeddingStore> = client.clone();
                    let catalog: Arc<dyn CatalogSource> = client;
                    (store, catalog)
                }
                "memory" => {
                    let path = config
                        .store
                        .embeddings_file
                        .as_deref()
                        .context("EMBEDDINGS_FILE is required for the memory backend")?;
                    let export = EmbeddingsExport::load(path)?;
                    let store = MemoryEmbeddingStore::new(export.embeddings, config.llm.embedding_dim);
                    tracing::info!(
                        embeddings = store.len(),
                        path = %path.display(),
                        "Loaded embeddings export"
                    );
                    let store: Arc<dyn EmbeddingStore> = Arc::new(store);
                    let catalog: Arc<dyn CatalogSource> =
                        Arc::new(MemoryCatalog::new(export.details));
                    (store, catalog)
                }
                other => anyhow::bail!("Unknown embeddings backend: {other}"),
            };

        let embedder: Arc<dyn Embedder> =
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone()));
        let model: Arc<dyn LanguageModel> =
            Arc::new(ChatModel::new(http_client, config.llm.clone()));

        Ok(Self::from_parts(config, embedder, store, catalog, model))
    }

    /// Wire a pipeline from already-built components.
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EmbeddingStore>,
        catalog: Arc<dyn CatalogSource>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let agent = &config.agent;
        let pipeline = Pipeline::new(
            embedder,
            Retriever::with_fallbacks(store.clone(), agent),
            Enricher::new(catalog, agent.enrich_concurrency),
            Composer::new(model, agent.temperature, agent.model_timeout()),
            agent.embed_timeout(),
        );
        let permits = agent.max_concurrent_searches;

        Self {
            pipeline: Arc::new(pipeline),
            store,
            search_semaphore: Arc::new(tokio::sync::Semaphore::new(permits)),
            config,
        }
    }
}
