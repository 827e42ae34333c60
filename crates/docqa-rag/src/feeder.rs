//! Splits documents into passages and writes them to an evidence store

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use docqa_core::{Error, EvidenceStore, Passage, Result};

const SEPARATOR: &str = "\n\n";

/// Split `text` on blank lines and greedily merge the pieces into chunks of at
/// most `chunk_size` characters.
///
/// Consecutive chunks share trailing pieces totalling at most `chunk_overlap`
/// characters. A single piece longer than `chunk_size` becomes its own chunk.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let sep_len = SEPARATOR.len();
    let mut chunks = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut current_len = 0usize;

    for piece in text.split(SEPARATOR).map(str::trim).filter(|p| !p.is_empty()) {
        let piece_len = piece.chars().count();

        if !current.is_empty() && current_len + sep_len + piece_len > chunk_size {
            chunks.push(join(&current));

            while current_len > chunk_overlap
                || (current_len > 0 && current_len + sep_len + piece_len > chunk_size)
            {
                let Some((_, removed)) = current.pop_front() else { break };
                let joiner = if current.is_empty() { 0 } else { sep_len };
                current_len = current_len.saturating_sub(removed + joiner);
            }
        }

        current_len = if current.is_empty() {
            piece_len
        } else {
            current_len + sep_len + piece_len
        };
        current.push_back((piece, piece_len));
    }

    if !current.is_empty() {
        chunks.push(join(&current));
    }

    chunks
}

fn join(pieces: &VecDeque<(&str, usize)>) -> String {
    pieces
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Loads text files into an evidence store
pub struct PassageFeeder {
    store: Arc<dyn EvidenceStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl PassageFeeder {
    pub const DEFAULT_CHUNK_SIZE: usize = 200;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 0;

    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput("chunk size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        Ok(self)
    }

    /// Build passages for `text`, tagging each with its source and chunk index
    pub fn passages(&self, text: &str, source: &str) -> Vec<Passage> {
        let indexed_at = chrono::Utc::now().to_rfc3339();
        split_text(text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                Passage::new(chunk).with_metadata(json!({
                    "source": source,
                    "chunk": i,
                    "indexed_at": indexed_at,
                }))
            })
            .collect()
    }

    /// Read a text file and store its passages, returning how many were written
    pub async fn feed_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let source = path.display().to_string();

        let passages = self.passages(&text, &source);
        if passages.is_empty() {
            tracing::warn!(source = %source, "No text to index");
            return Ok(0);
        }

        let count = self.store.add_passages(passages).await?;
        tracing::info!(
            source = %source,
            count,
            collection = self.store.collection(),
            "Indexed document"
        );
        Ok(count)
    }
}
