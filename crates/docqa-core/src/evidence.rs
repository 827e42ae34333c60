//! Evidence store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Content of the passage every collection is seeded with so it is never empty.
/// Stores may return it; retrieval always filters it out.
pub const PLACEHOLDER_CONTENT: &str = "This is a placeholder document for initialization.";

/// One retrieved unit of document text.
///
/// Two passages are the same piece of evidence when their `content` is equal;
/// `metadata` and `score` never take part in that comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    /// Create a passage without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            score: None,
        }
    }

    /// Attach origin metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this is the reserved initialization passage
    pub fn is_placeholder(&self) -> bool {
        self.content == PLACEHOLDER_CONTENT
    }
}

/// Trait for similarity-search backends (e.g., Qdrant)
///
/// Implementations are shared read-only between concurrent requests.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Return the `k` passages most similar to `text`, best first
    async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<Passage>>;

    /// Insert or replace passages, returning how many were written
    async fn add_passages(&self, passages: Vec<Passage>) -> Result<usize>;

    /// Name of the collection this store searches
    fn collection(&self) -> &str;
}
