//! Shared error taxonomy for the ingestion and retrieval pipeline.

use std::path::PathBuf;

/// Errors produced by the listing pipeline.
///
/// Each stage surfaces its own variant; nothing is caught and retried inside
/// the pipeline itself. A failure in any stage aborts the whole build before
/// the index artifact is created, so a persisted index is always complete.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network failure or non-2xx response while fetching listings.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The response body was not a JSON array of listing objects.
    #[error("unable to parse listings: {0}")]
    Parse(String),

    /// The embedding provider rejected the input or is unavailable.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// No persisted index exists at the given location.
    #[error("no index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// A persisted index exists but is unreadable or incompatible.
    #[error("index is unreadable or incompatible: {0}")]
    CorruptIndex(String),

    /// A caller-supplied argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying storage failure (SQLite, sqlite-vec).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
