//! The embedding seam: providers turn chunk text into fixed-dimension
//! vectors.
//!
//! [`EmbeddingProvider`] is the object-safe trait the pipeline and the
//! retriever share; as long as both sides hold the same provider instance,
//! query vectors and stored vectors live in the same space. Providers are
//! constructed once per process and shared via `Arc` — any expensive model
//! setup happens at construction, not per chunk.
//!
//! Two implementations ship with the crate:
//!
//! * [`HashEmbeddingProvider`] — deterministic, offline, seeded from a hash
//!   of the input. No semantic signal, but stable across runs; used by the
//!   tests and the default binaries.
//! * [`RigEmbeddingProvider`] — adapter over any
//!   [`rig::embeddings::EmbeddingModel`] (OpenAI, Ollama, ...), batching
//!   requests to the model's document limit.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};

use crate::types::PipelineError;

/// Converts text into fixed-dimension vectors.
///
/// Contract: deterministic for a fixed provider configuration (same text,
/// same vector), fixed [`dimensions`](Self::dimensions) for every output,
/// and [`PipelineError::Embedding`] for blank input or an unavailable
/// backing model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for this provider configuration (model name etc.).
    fn id(&self) -> &str;

    /// Output vector dimension.
    fn dimensions(&self) -> usize;

    /// Embeds a batch of texts, one vector per input, order preserved.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::Embedding("provider returned no vector".to_string()))
    }
}

fn ensure_embeddable(texts: &[String]) -> Result<(), PipelineError> {
    for (idx, text) in texts.iter().enumerate() {
        if text.trim().is_empty() {
            return Err(PipelineError::Embedding(format!(
                "input {idx} is empty or whitespace-only"
            )));
        }
    }
    Ok(())
}

/// Deterministic offline provider seeded from a hash of the input text.
///
/// Vectors carry no semantic signal, but they are unit-normalized and stable
/// across runs and processes, which is what the tests and the offline
/// binaries need.
#[derive(Clone, Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    id: String,
}

impl HashEmbeddingProvider {
    /// Matches the dimension of the small sentence-transformer models this
    /// provider stands in for.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            id: format!("hash-embedder-{dimensions}"),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i % 61) as u32) ^ ((i as u64).wrapping_mul(0x9E37_79B9));
                (bits as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        ensure_embeddable(texts)?;
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Adapter exposing any rig [`EmbeddingModel`] as an [`EmbeddingProvider`].
///
/// Batches are sliced to the model's `MAX_DOCUMENTS` so large ingestion runs
/// do not overflow a provider's per-request limit.
#[derive(Clone)]
pub struct RigEmbeddingProvider<M> {
    model: M,
    id: String,
}

impl<M> RigEmbeddingProvider<M>
where
    M: EmbeddingModel + Send + Sync,
{
    pub fn new(model: M, id: impl Into<String>) -> Self {
        Self {
            model,
            id: id.into(),
        }
    }
}

#[async_trait]
impl<M> EmbeddingProvider for RigEmbeddingProvider<M>
where
    M: EmbeddingModel + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn dimensions(&self) -> usize {
        self.model.ndims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        ensure_embeddable(texts)?;

        let batch_size = M::MAX_DOCUMENTS.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|err| PipelineError::Embedding(err.to_string()))?;
            if embeddings.len() != batch.len() {
                return Err(PipelineError::Embedding(format!(
                    "model returned {} vectors for {} inputs",
                    embeddings.len(),
                    batch.len()
                )));
            }
            vectors.extend(
                embeddings
                    .into_iter()
                    .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect()),
            );
        }
        Ok(vectors)
    }
}

/// Bridges an [`EmbeddingProvider`] into rig's [`EmbeddingModel`] trait so
/// the SQLite store can reuse rig-sqlite's schema machinery.
#[derive(Clone)]
pub struct IndexEmbeddingModel {
    provider: Arc<dyn EmbeddingProvider>,
}

impl IndexEmbeddingModel {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

impl EmbeddingModel for IndexEmbeddingModel {
    const MAX_DOCUMENTS: usize = 64;

    type Client = Arc<dyn EmbeddingProvider>;

    fn make(client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
        Self::new(Arc::clone(client))
    }

    fn ndims(&self) -> usize {
        self.provider.dimensions()
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let docs: Vec<String> = texts.into_iter().collect();
        let provider = Arc::clone(&self.provider);
        async move {
            let vectors = provider
                .embed_batch(&docs)
                .await
                .map_err(|err| EmbeddingError::ProviderError(err.to_string()))?;
            Ok(docs
                .into_iter()
                .zip(vectors)
                .map(|(document, vec)| Embedding {
                    document,
                    vec: vec.into_iter().map(f64::from).collect(),
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_provider_is_deterministic() {
        let provider = HashEmbeddingProvider::default();
        let a = provider.embed("Kochi rafting").await.unwrap();
        let b = provider.embed("Kochi rafting").await.unwrap();
        assert_eq!(a, b);

        let other = provider.embed("Munnar trekking").await.unwrap();
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn hash_provider_has_fixed_dimensions() {
        let provider = HashEmbeddingProvider::new(16);
        assert_eq!(provider.dimensions(), 16);
        let vector = provider.embed("anything").await.unwrap();
        assert_eq!(vector.len(), 16);
    }

    #[tokio::test]
    async fn hash_provider_vectors_are_unit_normalized() {
        let provider = HashEmbeddingProvider::default();
        let vector = provider.embed("normalize me").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let provider = HashEmbeddingProvider::default();
        let err = provider.embed("").await.unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));

        let err = provider
            .embed_batch(&["fine".to_string(), "   ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
    }

    #[tokio::test]
    async fn index_model_bridges_the_provider() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new(8));
        let model = IndexEmbeddingModel::new(Arc::clone(&provider));
        assert_eq!(model.ndims(), 8);

        let embeddings = model
            .embed_texts(vec!["houseboat".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].document, "houseboat");

        let direct = provider.embed("houseboat").await.unwrap();
        let bridged: Vec<f32> = embeddings[0].vec.iter().map(|v| *v as f32).collect();
        assert_eq!(bridged, direct);
    }
}
