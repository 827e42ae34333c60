use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;

use docqa_core::{Embedder, Error, EvidenceStore, Passage, Result, PLACEHOLDER_CONTENT};

use super::passage_id;

const CONTENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";

/// Evidence store backed by a Qdrant collection
pub struct QdrantEvidenceStore {
    client: Qdrant,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl QdrantEvidenceStore {
    /// Connect, create the collection if missing and seed the placeholder passage.
    ///
    /// Any failure here is fatal for the caller: there is no store to answer from.
    pub async fn connect(url: &str, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::EvidenceStore(format!("Failed to create Qdrant client: {}", e)))?;

        let store = Self {
            client,
            collection: collection.to_string(),
            embedder,
        };

        store.ensure_collection().await?;
        store.add_passages(vec![Passage::new(PLACEHOLDER_CONTENT)]).await?;

        tracing::info!(url, collection, "Connected to Qdrant");
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| Error::EvidenceStore(format!("Failed to list collections: {}", e)))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            let dimensions = self.embedder.dimensions() as u64;
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dimensions, Distance::Cosine)),
                )
                .await
                .map_err(|e| Error::EvidenceStore(format!("Failed to create collection: {}", e)))?;
            tracing::info!(collection = %self.collection, dimensions, "Created Qdrant collection");
        }

        Ok(())
    }
}

#[async_trait]
impl EvidenceStore for QdrantEvidenceStore {
    async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<Passage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text).await?;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, k as u64).with_payload(true),
            )
            .await
            .map_err(|e| Error::EvidenceStore(format!("Search failed: {}", e)))?;

        Ok(response.result.into_iter().map(passage_from_point).collect())
    }

    async fn add_passages(&self, passages: Vec<Passage>) -> Result<usize> {
        if passages.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let points: Vec<PointStruct> = passages
            .into_iter()
            .zip(vectors)
            .map(|(passage, vector)| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert(CONTENT_KEY.to_string(), Value::from(passage.content.clone()));
                payload.insert(METADATA_KEY.to_string(), json_to_value(&passage.metadata));
                PointStruct::new(passage_id(&passage.content), vector, payload)
            })
            .collect();

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| Error::EvidenceStore(format!("Upsert failed: {}", e)))?;

        tracing::debug!(collection = %self.collection, count, "Upserted passages");
        Ok(count)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

fn passage_from_point(point: ScoredPoint) -> Passage {
    let mut payload = point.payload;
    let content = match payload.remove(CONTENT_KEY) {
        Some(Value {
            kind: Some(Kind::StringValue(s)),
        }) => s,
        _ => String::new(),
    };
    let metadata = payload
        .remove(METADATA_KEY)
        .map(|v| value_to_json(&v))
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

    Passage {
        content,
        metadata,
        score: Some(point.score),
    }
}

/// Convert JSON metadata into a Qdrant payload value.
///
/// Scalars map one-to-one; objects and arrays are stored as JSON text.
fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::String(s) => Value::from(s.clone()),
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::Null => Value { kind: None },
        other => Value::from(other.to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::from_str::<serde_json::Value>(s)
            .ok()
            .filter(|v| v.is_object() || v.is_array())
            .unwrap_or_else(|| serde_json::Value::String(s.clone())),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(*d),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_value_conversion() {
        let metadata = json!({"source": "notes.md", "chunk": 3});
        let stored = json_to_value(&metadata);
        assert_eq!(value_to_json(&stored), metadata);

        assert_eq!(value_to_json(&json_to_value(&json!("plain"))), json!("plain"));
        assert_eq!(value_to_json(&json_to_value(&json!(42))), json!(42));
        assert_eq!(value_to_json(&json_to_value(&json!(true))), json!(true));
    }

    #[test]
    fn test_passage_from_point_reads_payload() {
        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), Value::from("Qdrant stores vectors".to_string()));
        payload.insert(
            METADATA_KEY.to_string(),
            json_to_value(&json!({"source": "guide.md"})),
        );
        let point = ScoredPoint {
            payload,
            score: 0.5,
            ..Default::default()
        };

        let passage = passage_from_point(point);
        assert_eq!(passage.content, "Qdrant stores vectors");
        assert_eq!(passage.metadata["source"], "guide.md");
        assert_eq!(passage.score, Some(0.5));
    }
}
