//! Markdown document parsing: front-matter validation, chunking, and
//! metadata formatting for a single file.
//!
//! [`parse`] is the entry point used by the importer. It reads the file,
//! validates the front-matter before anything else, splits the body, and
//! returns contents and metadata records of equal length.

use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::chunk::chunk_document;
use crate::error::ParseError;
use crate::frontmatter;
use crate::metadata::format_chunks;
use crate::models::{ChunkMetadata, SourceDocument};

/// Chunk texts paired by position with their metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub contents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl ParsedDocument {
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// Read `path` and validate its front-matter.
pub fn load_document(path: &Path, repository: &str) -> Result<SourceDocument, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (front_matter, body) = frontmatter::parse(path, &text)?;

    Ok(SourceDocument {
        path: path.to_path_buf(),
        repository: repository.to_string(),
        front_matter,
        body,
    })
}

/// Parse a Markdown file into chunk contents and metadata.
///
/// # Errors
///
/// - [`ParseError::Io`] if the file cannot be read.
/// - [`ParseError::MissingFrontmatter`] / [`ParseError::InvalidFrontmatter`]
///   if there is no usable front-matter block.
/// - [`ParseError::MissingField`] for the first required field that is
///   absent or blank.
/// - [`ParseError::InvalidChunking`] if `chunk_overlap >= chunk_size`.
pub fn parse(
    path: &Path,
    repository: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<ParsedDocument, ParseError> {
    let document = load_document(path, repository)?;
    let chunks = chunk_document(&document.body, chunk_size, chunk_overlap)?;
    let metadatas = format_chunks(&document, &chunks, Utc::now());

    debug!(
        "Parsed {}:{} into {} chunks",
        repository,
        path.display(),
        chunks.len()
    );

    Ok(ParsedDocument {
        contents: chunks.into_iter().map(|c| c.content).collect(),
        metadatas,
    })
}
