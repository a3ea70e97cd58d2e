//! # tripsmith: travel-service listing search
//!
//! Fetches travel-service listings from a JSON feed, normalizes them into
//! canonical documents, splits them into bounded overlapping chunks, embeds
//! each chunk, and persists the vectors in a SQLite + sqlite-vec index that
//! answers free-text similarity queries.
//!
//! ```text
//! Listings feed ──► ingestion::fetch ──► RawListing
//!                                          │
//!                   ingestion::normalize ──► Document
//!                                          │
//!                   splitter ─────────────► chunks (≤ max, overlapping)
//!                                          │
//!                   embeddings ───────────► vectors
//!                                          │
//!                   stores::sqlite ───────► persisted index artifact
//!                                          │
//! Free-text query ──► query::Retriever ◄──┘
//! ```
//!
//! The pipeline is a sequential batch job: each stage hands an immutable
//! collection to the next, and a failure at any stage aborts the build
//! before the index artifact exists. Querying an opened index is read-only
//! and safe to share; rebuilding the same artifact needs exclusive access.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tripsmith::config::PipelineConfig;
//! use tripsmith::embeddings::HashEmbeddingProvider;
//! use tripsmith::pipeline::IngestionPipeline;
//! use tripsmith::query::Retriever;
//!
//! let provider = Arc::new(HashEmbeddingProvider::default());
//! let pipeline = IngestionPipeline::new(PipelineConfig::from_env()?, provider.clone())?;
//! let (index, report) = pipeline.run().await?;
//!
//! let retriever = Retriever::new(provider, Arc::new(index));
//! let hits = retriever.search("Where is Kochi Adventure Co.?", 2).await?;
//! ```

pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod pipeline;
pub mod query;
pub mod splitter;
pub mod stores;
pub mod types;

pub use config::PipelineConfig;
pub use embeddings::{EmbeddingProvider, HashEmbeddingProvider, IndexEmbeddingModel};
pub use ingestion::{Document, ServiceRecord};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use query::{Retriever, SearchHit};
pub use splitter::{RecursiveCharacterSplitter, SplitterConfig};
pub use stores::{ListingChunk, ListingStore, SqliteListingIndex};
pub use types::PipelineError;
