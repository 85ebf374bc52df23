//! Per-chunk provenance records.

use chrono::{DateTime, Utc};

use crate::models::{Chunk, ChunkMetadata, SourceDocument};

/// Timestamp layout stored in `last_update` (always UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S-00:00";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Build one metadata record per chunk, in chunk order.
///
/// Every record carries the same `last_update`, taken from `at`.
pub fn format_chunks(
    document: &SourceDocument,
    chunks: &[Chunk],
    at: DateTime<Utc>,
) -> Vec<ChunkMetadata> {
    let last_update = format_timestamp(at);
    let path = document.path.to_string_lossy().to_string();
    let fm = &document.front_matter;

    chunks
        .iter()
        .map(|chunk| ChunkMetadata {
            title: fm.title.clone(),
            source: path.clone(),
            uri: fm.uri.clone(),
            repository: document.repository.clone(),
            path: path.clone(),
            summary: fm.summary.clone(),
            authors: fm.authors.clone(),
            last_update: last_update.clone(),
            heading: chunk.heading_context.clone(),
            chunk_number: chunk.sequence_number,
        })
        .collect()
}
