//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Turns text into dense vectors for similarity search.
///
/// One embedder is constructed at process start and shared by handle
/// (`Arc<dyn Embedder>`) with every component that needs it.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimension of the produced vectors
    fn dimensions(&self) -> usize;

    /// Name of the embedding model
    fn model_name(&self) -> &str;
}
