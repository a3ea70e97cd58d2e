//! Storage for listing chunks and their embedding vectors.
//!
//! [`ListingStore`] is the backend-agnostic interface the retriever works
//! against; [`sqlite::SqliteListingIndex`] is the one concrete backend,
//! persisting vectors through sqlite-vec in a single SQLite file.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │   ListingStore   │
//!                  │  (async search)  │
//!                  └────────┬─────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │      SQLite      │
//!                  │    sqlite-vec    │
//!                  └──────────────────┘
//! ```

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

pub use sqlite::{ListingDocument, SqliteListingIndex};

/// A chunk of listing text with its embedding, ready for storage.
///
/// Backend-agnostic counterpart of the SQLite row type
/// [`ListingDocument`]; conversions exist in both directions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingChunk {
    /// Unique identifier for this chunk.
    pub id: String,
    /// URL of the feed the listing came from.
    pub source: String,
    /// City the service operates in (may be empty).
    pub city: String,
    /// Kind of service offered (may be empty).
    pub service_type: String,
    /// Provider name (may be empty).
    pub provider: String,
    /// Zero-based index of this chunk within its document.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
    /// The embedding vector, if computed.
    pub embedding: Option<Vec<f32>>,
}

impl ListingChunk {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            city: String::new(),
            service_type: String::new(),
            provider: String::new(),
            chunk_index,
            content: content.into(),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_record(mut self, city: &str, service_type: &str, provider: &str) -> Self {
        self.city = city.to_string();
        self.service_type = service_type.to_string();
        self.provider = provider.to_string();
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl From<ListingChunk> for ListingDocument {
    fn from(chunk: ListingChunk) -> Self {
        ListingDocument {
            id: chunk.id,
            source: chunk.source,
            city: chunk.city,
            service_type: chunk.service_type,
            provider: chunk.provider,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
        }
    }
}

impl From<ListingDocument> for ListingChunk {
    fn from(doc: ListingDocument) -> Self {
        ListingChunk {
            id: doc.id,
            source: doc.source,
            city: doc.city,
            service_type: doc.service_type,
            provider: doc.provider,
            chunk_index: doc.chunk_index,
            content: doc.content,
            embedding: None,
        }
    }
}

/// Unified interface for chunk storage backends.
///
/// Searches return `(chunk, similarity)` pairs ordered most-similar-first.
/// Implementations reject `top_k < 1` with
/// [`PipelineError::InvalidArgument`] and cap `top_k` at the index size, so
/// a result always has length `min(top_k, size)`.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts chunk records; records without embeddings are skipped.
    async fn insert_chunks(&self, chunks: Vec<ListingChunk>) -> Result<(), PipelineError>;

    /// Nearest stored chunks to `query_embedding` by cosine similarity.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ListingChunk, f32)>, PipelineError>;

    /// Like [`search_similar`](Self::search_similar), restricted to chunks
    /// whose city column matches exactly.
    async fn search_similar_in_city(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        city: &str,
    ) -> Result<Vec<(ListingChunk, f32)>, PipelineError>;

    /// Total number of chunks in the store.
    async fn count(&self) -> Result<usize, PipelineError>;
}
