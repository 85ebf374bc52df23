//! Embedding and upsert of chunks into the vector index.
//!
//! [`VectorStore`] pairs an [`Embedder`] with a [`VectorIndex`]. On
//! [`connect`](VectorStore::connect) it measures the embedding dimension
//! with a probe text and makes sure the index exists with a matching
//! schema.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::RemoteError;
use crate::index::schema::KEY_FIELD;
use crate::index::{FieldFilter, IndexQuery, IndexSchema, VectorIndex};
use crate::models::{ChunkMetadata, IndexedChunk};

const DIMENSION_PROBE: &str = "Text";

/// A chunk returned by [`VectorStore::search`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub metadata: Option<ChunkMetadata>,
}

pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    dimensions: usize,
}

impl VectorStore {
    /// Probe the embedding dimension and ensure the index schema exists.
    pub async fn connect(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, RemoteError> {
        let dimensions = embedder.embed_query(DIMENSION_PROBE).await?.len();
        if dimensions == 0 {
            return Err(RemoteError::Decode(
                "embedding provider returned an empty vector".to_string(),
            ));
        }

        index
            .ensure_index(&IndexSchema::for_dimensions(dimensions))
            .await?;
        info!(
            "Vector store ready: {} (index), {} (model), {} dimensions",
            index.name(),
            embedder.model_name(),
            dimensions
        );

        Ok(Self {
            embedder,
            index,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed `contents` and upsert them with their `metadatas`.
    ///
    /// Returns the generated document keys in input order. Any document the
    /// index rejects fails the whole call with [`RemoteError::PartialWrite`].
    pub async fn load_chunks(
        &self,
        contents: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<Vec<String>, RemoteError> {
        if contents.len() != metadatas.len() {
            return Err(RemoteError::LengthMismatch {
                contents: contents.len(),
                metadatas: metadatas.len(),
            });
        }
        if contents.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_texts(contents).await?;
        if vectors.len() != contents.len() {
            return Err(RemoteError::Decode(format!(
                "expected {} embeddings, got {}",
                contents.len(),
                vectors.len()
            )));
        }

        let mut chunks = Vec::with_capacity(contents.len());
        for ((content, vector), metadata) in contents.iter().zip(vectors).zip(metadatas) {
            let id = Uuid::new_v4().to_string();
            let chunk = IndexedChunk::new(id, content.clone(), vector, metadata)
                .map_err(|e| RemoteError::Decode(e.to_string()))?;
            chunks.push(chunk);
        }

        let outcomes = self.index.upsert(&chunks).await?;
        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        if failed > 0 {
            for outcome in outcomes.iter().filter(|o| !o.succeeded) {
                debug!(
                    "Upsert of {} failed: {}",
                    outcome.key,
                    outcome.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            return Err(RemoteError::PartialWrite {
                failed,
                total: chunks.len(),
            });
        }

        debug!("Indexed {} chunks into {}", chunks.len(), self.index.name());
        Ok(chunks.into_iter().map(|c| c.id).collect())
    }

    /// Return the `k` chunks most similar to `query`, optionally restricted
    /// by `filter`.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<FieldFilter>,
    ) -> Result<Vec<SearchHit>, RemoteError> {
        let vector = self.embedder.embed_query(query).await?;
        let documents = self
            .index
            .query(&IndexQuery::nearest(vector, k, filter))
            .await?;

        Ok(documents
            .iter()
            .map(|d| SearchHit {
                id: text_field(d, KEY_FIELD),
                content: text_field(d, "content"),
                score: d.get("@search.score").and_then(|s| s.as_f64()).unwrap_or(0.0),
                metadata: d
                    .get("metadata")
                    .and_then(|m| m.as_str())
                    .and_then(|m| serde_json::from_str(m).ok()),
            })
            .collect())
    }
}

fn text_field(document: &serde_json::Value, field: &str) -> String {
    document
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
