//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow contract the importer needs from a
//! remote search service: create the index, write and delete documents by
//! key, query by field equality (optionally ranked by vector similarity),
//! and read size statistics.
//!
//! # Backends
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`AzureSearchIndex`] | Azure AI Search over its REST API |
//! | [`InMemoryIndex`] | process-local index for tests and dry runs |
//!
//! Implementations must be `Send + Sync`; the importer holds them behind an
//! `Arc<dyn VectorIndex>`.

pub mod azure;
pub mod memory;
pub mod schema;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{IndexStatistics, IndexedChunk, WriteOutcome};

pub use azure::AzureSearchIndex;
pub use memory::{InMemoryIndex, IndexOperation};
pub use schema::IndexSchema;

/// Conjunction of exact-match field conditions.
///
/// Rendered as an OData filter such as
/// `repository eq 'docs' and source eq 'a/b.md'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    conditions: Vec<(String, String)>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field eq 'value'` condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render as an OData `$filter` expression. Single quotes inside values
    /// are doubled.
    pub fn to_odata(&self) -> String {
        self.conditions
            .iter()
            .map(|(field, value)| format!("{} eq '{}'", field, value.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// Whether a stored document satisfies every condition.
    pub fn matches(&self, document: &serde_json::Value) -> bool {
        self.conditions.iter().all(|(field, value)| {
            document.get(field).and_then(|v| v.as_str()) == Some(value.as_str())
        })
    }
}

/// Nearest-neighbour clause of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
}

/// A filtered, paged read against the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub filter: Option<FieldFilter>,
    /// Fields to return; empty means all retrievable fields.
    pub select: Vec<String>,
    pub top: usize,
    pub skip: usize,
    pub vector: Option<VectorQuery>,
}

impl IndexQuery {
    /// Match every document satisfying `filter`, first page of `top`.
    pub fn filtered(filter: FieldFilter, top: usize) -> Self {
        Self {
            filter: Some(filter),
            select: Vec::new(),
            top,
            skip: 0,
            vector: None,
        }
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Rank by similarity to `vector`, keeping the `k` nearest.
    pub fn nearest(vector: Vec<f32>, k: usize, filter: Option<FieldFilter>) -> Self {
        Self {
            filter,
            select: Vec::new(),
            top: k,
            skip: 0,
            vector: Some(VectorQuery { vector, k }),
        }
    }
}

/// Remote store of [`IndexedChunk`]s.
///
/// Write operations report a [`WriteOutcome`] per key; a rejected document
/// is not an `Err`. `Err` is reserved for transport, auth, and protocol
/// failures that affect the whole call.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Index name, for log lines.
    fn name(&self) -> &str;

    /// Create the index with `schema` if it does not already exist.
    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), RemoteError>;

    /// Insert or replace documents by `id`.
    async fn upsert(&self, chunks: &[IndexedChunk]) -> Result<Vec<WriteOutcome>, RemoteError>;

    /// Run a query, returning raw documents. Vector queries carry a
    /// `@search.score` field on every hit.
    async fn query(&self, query: &IndexQuery) -> Result<Vec<serde_json::Value>, RemoteError>;

    /// Delete documents by key.
    async fn delete(&self, keys: &[String]) -> Result<Vec<WriteOutcome>, RemoteError>;

    /// Current document count and storage sizes.
    async fn statistics(&self) -> Result<IndexStatistics, RemoteError>;

    /// Drop the whole index.
    async fn delete_index(&self) -> Result<(), RemoteError>;
}
