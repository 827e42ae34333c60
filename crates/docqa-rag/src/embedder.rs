//! Hashed-feature embedder
//!
//! Produces deterministic bag-of-words vectors without a model server. Good
//! enough for offline runs and tests; real deployments use the Ollama embedder.

use async_trait::async_trait;

use docqa_core::{Embedder, Result};

pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const MODEL_NAME: &'static str = "hashed-features";

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, usize) {
        let digest = md5::compute(feature.as_bytes()).0;
        let primary = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        let secondary = u64::from_le_bytes([
            digest[8], digest[9], digest[10], digest[11], digest[12], digest[13], digest[14], digest[15],
        ]);
        (
            (primary % self.dimensions as u64) as usize,
            (secondary % self.dimensions as u64) as usize,
        )
    }

    /// Synchronous core of `embed`
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>();

        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut vector = vec![0.0f32; self.dimensions];

        for (i, word) in words.iter().enumerate() {
            let (primary, secondary) = self.bucket(word);
            let weight = 1.0 / (1.0 + i as f32 * 0.1);
            vector[primary] += weight;

            if word.len() > 3 {
                vector[secondary] += weight * 0.5;
            }
        }

        for window in words.windows(2) {
            let (idx, _) = self.bucket(&format!("{} {}", window[0], window[1]));
            vector[idx] += 0.3;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}
