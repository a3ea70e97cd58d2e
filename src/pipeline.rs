//! The end-to-end ingestion pipeline.
//!
//! Runs fetch → normalize → chunk → embed → index strictly in order. Every
//! stage hands an immutable collection to the next; a failure at any stage
//! aborts the run before the index artifact is created, so a persisted
//! index is always complete.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::info;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::embeddings::{EmbeddingProvider, IndexEmbeddingModel};
use crate::ingestion::{ListingCache, fetch_listings, normalize_listings};
use crate::splitter::RecursiveCharacterSplitter;
use crate::stores::sqlite::{ListingDocument, SqliteListingIndex};
use crate::types::PipelineError;

/// Counters from one ingestion run.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub listings: usize,
    pub documents: usize,
    pub chunks: usize,
    pub from_cache: bool,
    pub duration: Duration,
}

/// Owns every component of one ingestion run.
///
/// The embedding provider is injected rather than constructed here so the
/// same instance can serve the retriever afterwards — query vectors must
/// come from the same provider configuration as the stored vectors.
pub struct IngestionPipeline {
    config: PipelineConfig,
    client: Client,
    provider: Arc<dyn EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            config,
            client,
            provider,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetches, normalizes, chunks, embeds, and indexes the listings feed,
    /// persisting the index at the configured path.
    ///
    /// Returns the freshly built index (ready for queries) together with the
    /// run counters.
    pub async fn run(
        &self,
    ) -> Result<(SqliteListingIndex<IndexEmbeddingModel>, IngestReport), PipelineError> {
        let start = Instant::now();

        let cache = self.config.cache_dir.clone().map(ListingCache::new);
        let fetch = fetch_listings(&self.client, &self.config.source_url, cache.as_ref()).await?;
        info!(
            listings = fetch.listings.len(),
            bytes = fetch.bytes,
            from_cache = fetch.from_cache,
            "fetched listings feed"
        );

        let documents = normalize_listings(&fetch.listings);

        let splitter = RecursiveCharacterSplitter::new(self.config.splitter.clone());
        let mut chunks: Vec<ListingDocument> = Vec::new();
        for document in &documents {
            for (chunk_index, content) in splitter.split(&document.text).into_iter().enumerate() {
                chunks.push(ListingDocument {
                    id: Uuid::new_v4().to_string(),
                    source: self.config.source_url.to_string(),
                    city: document.record.city.clone(),
                    service_type: document.record.service_type.clone(),
                    provider: document.record.provider_name.clone(),
                    chunk_index,
                    content,
                });
            }
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "normalized and chunked listings"
        );

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.provider.embed_batch(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(PipelineError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        info!(
            embedder = self.provider.id(),
            dimensions = self.provider.dimensions(),
            "embedded chunks"
        );

        // All inputs are embedded before the artifact is touched; only now
        // does the on-disk index come into existence.
        let model = IndexEmbeddingModel::new(Arc::clone(&self.provider));
        let index = SqliteListingIndex::create(&self.config.index_path, &model).await?;
        index
            .add_chunks(chunks.into_iter().zip(vectors).collect())
            .await?;

        let report = IngestReport {
            listings: fetch.listings.len(),
            documents: documents.len(),
            chunks: index.count().await?,
            from_cache: fetch.from_cache,
            duration: start.elapsed(),
        };
        info!(
            chunks = report.chunks,
            elapsed_ms = report.duration.as_millis() as u64,
            path = %self.config.index_path.display(),
            "index build complete"
        );
        Ok((index, report))
    }
}
