use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::{Embedder, Error, EvidenceStore, Passage, Result, PLACEHOLDER_CONTENT};

use super::passage_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPassage {
    id: String,
    passage: Passage,
    embedding: Vec<f32>,
}

/// On-disk layout of a persisted collection
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    collection: String,
    embedding_dimension: usize,
    passages: Vec<StoredPassage>,
}

/// In-process evidence store ranked by cosine similarity.
///
/// Used for offline runs (`--local-store`) and tests. Seeded with the
/// placeholder passage like the Qdrant store. When opened with a data file
/// the collection is loaded from it and rewritten after every upsert.
pub struct LocalEvidenceStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    passages: RwLock<Vec<StoredPassage>>,
    data_file: Option<PathBuf>,
}

impl LocalEvidenceStore {
    /// Memory-only store, lost when dropped
    pub async fn connect(collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store = Self {
            collection: collection.to_string(),
            embedder,
            passages: RwLock::new(Vec::new()),
            data_file: None,
        };
        store.add_passages(vec![Passage::new(PLACEHOLDER_CONTENT)]).await?;
        Ok(store)
    }

    /// Store backed by `data_file`, loading any passages already saved there
    pub async fn open(
        data_file: impl AsRef<Path>,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let data_file = data_file.as_ref().to_path_buf();
        let passages = if data_file.exists() {
            let loaded = load_from_file(&data_file)?;
            tracing::info!(
                path = %data_file.display(),
                passages = loaded.len(),
                "Loaded local evidence store"
            );
            loaded
        } else {
            Vec::new()
        };

        let store = Self {
            collection: collection.to_string(),
            embedder,
            passages: RwLock::new(passages),
            data_file: Some(data_file),
        };
        store.add_passages(vec![Passage::new(PLACEHOLDER_CONTENT)]).await?;
        Ok(store)
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    /// Number of stored passages, placeholder included
    pub fn len(&self) -> usize {
        self.passages.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error<T>(_: T) -> Error {
    Error::EvidenceStore("Local store lock poisoned".to_string())
}

fn load_from_file(path: &Path) -> Result<Vec<StoredPassage>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::EvidenceStore(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let data: StoreFile = serde_json::from_str(&content).map_err(|e| {
        Error::EvidenceStore(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    Ok(data.passages)
}

fn save_to_file(path: &Path, collection: &str, passages: &[StoredPassage]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            Error::EvidenceStore(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let data = StoreFile {
        collection: collection.to_string(),
        embedding_dimension: passages.first().map(|p| p.embedding.len()).unwrap_or(0),
        passages: passages.to_vec(),
    };
    let json = serde_json::to_string_pretty(&data)
        .map_err(|e| Error::EvidenceStore(format!("Failed to serialize store: {}", e)))?;
    fs::write(path, json).map_err(|e| {
        Error::EvidenceStore(format!("Failed to write {}: {}", path.display(), e))
    })?;
    Ok(())
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<Passage>> {
        let query = self.embedder.embed(text).await?;
        let passages = self.passages.read().map_err(lock_error)?;

        let mut scored: Vec<(f32, &StoredPassage)> = passages
            .iter()
            .map(|stored| (cosine_similarity(&query, &stored.embedding), stored))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, stored)| {
                let mut passage = stored.passage.clone();
                passage.score = Some(score);
                passage
            })
            .collect())
    }

    async fn add_passages(&self, passages: Vec<Passage>) -> Result<usize> {
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut stored = self.passages.write().map_err(lock_error)?;
        let mut count = 0;
        for (passage, embedding) in passages.into_iter().zip(embeddings) {
            let id = passage_id(&passage.content);
            let entry = StoredPassage {
                id,
                passage,
                embedding,
            };
            match stored.iter_mut().find(|s| s.id == entry.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
            count += 1;
        }

        if let Some(path) = &self.data_file {
            save_to_file(path, &self.collection, &stored)?;
        }

        Ok(count)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

/// Calculate cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
