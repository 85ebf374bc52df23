//! In-memory [`VectorIndex`] for tests and dry runs.
//!
//! Documents are kept as JSON objects in insertion order behind
//! `std::sync::RwLock`. Filtering supports the exact-match conjunctions
//! produced by [`FieldFilter`](super::FieldFilter); vector queries are
//! brute-force cosine similarity. Every call is appended to an operation
//! log so tests can assert on call order.

use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::schema::{KEY_FIELD, VECTOR_FIELD};
use super::{IndexQuery, IndexSchema, VectorIndex};
use crate::embedding::cosine_similarity;
use crate::error::RemoteError;
use crate::models::{IndexStatistics, IndexedChunk, WriteOutcome};

/// A call observed by [`InMemoryIndex`].
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    EnsureIndex { dimensions: usize },
    Upsert { keys: Vec<String> },
    Query { filter: Option<String> },
    Delete { keys: Vec<String> },
    DeleteIndex,
}

pub struct InMemoryIndex {
    name: String,
    schema: RwLock<Option<IndexSchema>>,
    documents: RwLock<Vec<Value>>,
    operations: RwLock<Vec<IndexOperation>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: RwLock::new(None),
            documents: RwLock::new(Vec::new()),
            operations: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every stored document.
    pub fn documents(&self) -> Vec<Value> {
        self.documents.read().unwrap().clone()
    }

    /// Calls received so far, oldest first.
    pub fn operations(&self) -> Vec<IndexOperation> {
        self.operations.read().unwrap().clone()
    }

    pub fn schema(&self) -> Option<IndexSchema> {
        self.schema.read().unwrap().clone()
    }

    fn record(&self, operation: IndexOperation) {
        self.operations.write().unwrap().push(operation);
    }

    /// Reject vectors whose length disagrees with the schema, as the remote
    /// service does.
    fn check_dimensions(&self, chunk: &IndexedChunk) -> Option<String> {
        let schema = self.schema.read().unwrap();
        match schema.as_ref() {
            Some(s) if s.dimensions() != chunk.content_vector.len() => Some(format!(
                "vector has {} dimensions, index expects {}",
                chunk.content_vector.len(),
                s.dimensions()
            )),
            _ => None,
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn key_of(document: &Value) -> Option<&str> {
    document.get(KEY_FIELD).and_then(|v| v.as_str())
}

fn project(document: &Value, select: &[String]) -> Value {
    if select.is_empty() {
        return document.clone();
    }
    let mut out = serde_json::Map::new();
    for field in select {
        if let Some(v) = document.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    Value::Object(out)
}

fn vector_of(document: &Value) -> Vec<f32> {
    document
        .get(VECTOR_FIELD)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|x| x.as_f64())
                .map(|x| x as f32)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), RemoteError> {
        self.record(IndexOperation::EnsureIndex {
            dimensions: schema.dimensions(),
        });
        let mut current = self.schema.write().unwrap();
        if current.is_none() {
            *current = Some(schema.clone());
        }
        Ok(())
    }

    async fn upsert(&self, chunks: &[IndexedChunk]) -> Result<Vec<WriteOutcome>, RemoteError> {
        self.record(IndexOperation::Upsert {
            keys: chunks.iter().map(|c| c.id.clone()).collect(),
        });

        let mut outcomes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(message) = self.check_dimensions(chunk) {
                outcomes.push(WriteOutcome {
                    key: chunk.id.clone(),
                    succeeded: false,
                    error_message: Some(message),
                });
                continue;
            }

            let document =
                serde_json::to_value(chunk).map_err(|e| RemoteError::Decode(e.to_string()))?;
            let mut documents = self.documents.write().unwrap();
            match documents.iter_mut().find(|d| key_of(d) == Some(chunk.id.as_str())) {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
            outcomes.push(WriteOutcome::ok(chunk.id.clone()));
        }
        Ok(outcomes)
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Value>, RemoteError> {
        self.record(IndexOperation::Query {
            filter: query.filter.as_ref().map(|f| f.to_odata()),
        });

        let documents = self.documents.read().unwrap();
        let matching = documents
            .iter()
            .filter(|d| query.filter.as_ref().map_or(true, |f| f.matches(d)));

        let hits: Vec<Value> = match &query.vector {
            Some(vector) => {
                let mut scored: Vec<(f32, &Value)> = matching
                    .map(|d| (cosine_similarity(&vector.vector, &vector_of(d)), d))
                    .collect();
                scored.sort_by(|a, b| b.0.total_cmp(&a.0));
                scored
                    .into_iter()
                    .take(vector.k)
                    .map(|(score, d)| {
                        let mut hit = project(d, &query.select);
                        hit["@search.score"] = json!(score);
                        hit
                    })
                    .collect()
            }
            None => matching.map(|d| project(d, &query.select)).collect(),
        };

        Ok(hits.into_iter().skip(query.skip).take(query.top).collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<WriteOutcome>, RemoteError> {
        self.record(IndexOperation::Delete {
            keys: keys.to_vec(),
        });
        let mut documents = self.documents.write().unwrap();
        documents.retain(|d| !key_of(d).is_some_and(|k| keys.iter().any(|key| key == k)));
        // Deleting an absent key succeeds, matching the remote service.
        Ok(keys.iter().map(|k| WriteOutcome::ok(k.clone())).collect())
    }

    async fn statistics(&self) -> Result<IndexStatistics, RemoteError> {
        let documents = self.documents.read().unwrap();
        let storage_size = documents.iter().map(|d| d.to_string().len() as u64).sum();
        let vector_index_size = documents
            .iter()
            .map(|d| (vector_of(d).len() * std::mem::size_of::<f32>()) as u64)
            .sum();
        Ok(IndexStatistics {
            document_count: documents.len() as u64,
            storage_size,
            vector_index_size,
        })
    }

    async fn delete_index(&self) -> Result<(), RemoteError> {
        self.record(IndexOperation::DeleteIndex);
        self.documents.write().unwrap().clear();
        *self.schema.write().unwrap() = None;
        Ok(())
    }
}
