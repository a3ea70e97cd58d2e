//! Free-text similarity search over a built or loaded index.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::embeddings::{EmbeddingProvider, IndexEmbeddingModel};
use crate::stores::{ListingChunk, ListingStore, SqliteListingIndex};
use crate::types::PipelineError;

/// One search result: a stored chunk and its similarity to the query.
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub content: String,
    /// Cosine similarity, higher is closer.
    pub score: f32,
    pub city: String,
    pub provider: String,
    pub service_type: String,
    pub source: String,
}

impl From<(ListingChunk, f32)> for SearchHit {
    fn from((chunk, score): (ListingChunk, f32)) -> Self {
        Self {
            content: chunk.content,
            score,
            city: chunk.city,
            provider: chunk.provider,
            service_type: chunk.service_type,
            source: chunk.source,
        }
    }
}

/// Embeds free-text queries and searches a listing store.
///
/// A pure function of (store contents, provider configuration, query, k):
/// the retriever holds no state of its own, so sharing one across tasks is
/// safe. The provider must be the same configuration that embedded the
/// stored chunks.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ListingStore>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever").finish_non_exhaustive()
    }
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn ListingStore>) -> Self {
        Self { provider, store }
    }

    /// Opens a persisted index at `path` and wraps it in a retriever.
    pub async fn open(
        path: impl AsRef<Path>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, PipelineError> {
        let model = IndexEmbeddingModel::new(Arc::clone(&provider));
        let index = SqliteListingIndex::open(path, &model).await?;
        Ok(Self::new(provider, Arc::new(index)))
    }

    /// Returns the `k` stored chunks most similar to `query`.
    ///
    /// `k < 1` is an [`PipelineError::InvalidArgument`]; `k` beyond the
    /// index size is capped, so results have length `min(k, size)`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, PipelineError> {
        if k < 1 {
            return Err(PipelineError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        let embedding = self.provider.embed(query).await?;
        let rows = self.store.search_similar(&embedding, k).await?;
        debug!(k, hits = rows.len(), "search complete");
        Ok(rows.into_iter().map(SearchHit::from).collect())
    }

    /// Like [`search`](Self::search), restricted to listings in `city`.
    pub async fn search_in_city(
        &self,
        query: &str,
        k: usize,
        city: &str,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        if k < 1 {
            return Err(PipelineError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        let embedding = self.provider.embed(query).await?;
        let rows = self
            .store
            .search_similar_in_city(&embedding, k, city)
            .await?;
        Ok(rows.into_iter().map(SearchHit::from).collect())
    }
}
