//! Core data models used throughout the importer.
//!
//! These types represent the documents, chunks, and index records that flow
//! through the parse → clean → index pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Heading path of a chunk, keyed `"Header 1"`, `"Header 2"`, `"Header 3"`.
pub type HeadingContext = BTreeMap<String, String>;

/// Validated front-matter of a Markdown document.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub summary: String,
    pub uri: String,
    pub authors: Vec<String>,
}

/// A Markdown file whose front-matter passed validation.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub repository: String,
    pub front_matter: FrontMatter,
    pub body: String,
}

/// A slice of a document body produced by splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub heading_context: HeadingContext,
    /// 1-based, contiguous across the whole document.
    pub sequence_number: usize,
}

/// Provenance attached to every chunk before it is indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub source: String,
    pub uri: String,
    pub repository: String,
    pub path: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub last_update: String,
    pub heading: HeadingContext,
    pub chunk_number: usize,
}

/// Unit stored in the remote vector index.
///
/// Serializes to the index document shape: the full [`ChunkMetadata`] as a
/// JSON string under `metadata`, plus the filterable fields copied to the
/// top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub content: String,
    pub content_vector: Vec<f32>,
    pub metadata: String,
    pub title: String,
    pub source: String,
    pub last_update: String,
    pub uri: String,
    pub repository: String,
    pub summary: String,
}

impl IndexedChunk {
    pub fn new(
        id: String,
        content: String,
        content_vector: Vec<f32>,
        metadata: &ChunkMetadata,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            content,
            content_vector,
            metadata: serde_json::to_string(metadata)?,
            title: metadata.title.clone(),
            source: metadata.source.clone(),
            last_update: metadata.last_update.clone(),
            uri: metadata.uri.clone(),
            repository: metadata.repository.clone(),
            summary: metadata.summary.clone(),
        })
    }
}

/// Snapshot of the remote index size, reported before and after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    pub document_count: u64,
    pub storage_size: u64,
    #[serde(default)]
    pub vector_index_size: u64,
}

/// Result of writing (or deleting) one document in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub key: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl WriteOutcome {
    pub fn ok(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            error_message: None,
        }
    }
}
