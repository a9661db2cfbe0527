//! Embedding oracle: maps text to fixed-dimension semantic vectors.
//!
//! The oracle boundary is async (`EmbeddingOracle`), matching every other
//! external collaborator in the pipeline; the reference `FastEmbedEmbedder`
//! implementation is itself synchronous (ONNX inference is CPU-bound) and
//! is adapted onto the async trait via `tokio::task::spawn_blocking`, per
//! the async-substitution note: oracle boundaries suspend cooperatively
//! even when the underlying call is a blocking worker-pool hop rather than
//! a network round trip.

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

use crate::error::{OracleError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Default embedding dimensions for the all-MiniLM-L6-v2 reference model.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// A synchronous embedding generator. Implementations must be
/// `Send + Sync` so they can be shared behind an `Arc` and called from
/// `spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimension this embedder produces.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts. The default implementation
    /// calls `embed` sequentially; implementations may override for batch
    /// optimization.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// The embedding oracle contract: `embed(texts) -> equal-length vectors`.
/// No batching guarantees beyond "one vector per input text, same order".
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embedding dimension produced by this oracle.
    fn dimensions(&self) -> usize;

    /// Embeds a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Embedding` if the underlying call fails.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, OracleError>;
}

/// Adapts any synchronous [`Embedder`] onto the async [`EmbeddingOracle`]
/// boundary by running it on the blocking thread pool.
pub struct BlockingEmbedderOracle {
    inner: Arc<dyn Embedder>,
}

impl BlockingEmbedderOracle {
    /// Wraps a synchronous embedder.
    #[must_use]
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EmbeddingOracle for BlockingEmbedderOracle {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, OracleError> {
        let inner = Arc::clone(&self.inner);
        let owned: Vec<String> = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
            inner.embed_batch(&refs)
        })
        .await
        .map_err(|e| OracleError::Embedding(format!("embedding task panicked: {e}")))?
        .map_err(|e| OracleError::Embedding(e.to_string()))
    }
}

/// Creates the default embedder based on available features.
///
/// # Errors
///
/// Returns an error if embedder initialization fails.
#[cfg(feature = "fastembed-embeddings")]
pub fn create_embedder() -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(FastEmbedEmbedder::new()?))
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical). Returns 0.0
/// if the vectors have different lengths or either has zero magnitude,
/// rather than panicking or returning `NaN`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEmbedder;

    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            #[allow(clippy::cast_precision_loss)]
            let seed = text.len() as f32;
            Ok(vec![seed, 1.0, 0.0, 0.0])
        }
    }

    #[test]
    fn cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn blocking_oracle_embeds_batch_in_order() {
        let oracle = BlockingEmbedderOracle::new(Arc::new(FakeEmbedder));
        let texts = vec!["a".to_string(), "bb".to_string()];
        let out = oracle.embed(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0][0] - 1.0).abs() < 1e-6);
        assert!((out[1][0] - 2.0).abs() < 1e-6);
    }
}
