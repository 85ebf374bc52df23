//! Error types for the import pipeline.
//!
//! Errors are split by how far they reach:
//!
//! | Type | Scope |
//! |------|-------|
//! | [`ConfigError`] | fatal, raised before any file is touched |
//! | [`RunError`] | fatal, raised while discovering files or reading index statistics |
//! | [`ImportError`] | per-file, recorded in the report and never aborts the run |
//!
//! [`ParseError`] and [`RemoteError`] are the two causes an [`ImportError`]
//! can carry.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A required front-matter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Summary,
    Uri,
    Authors,
}

impl Field {
    /// Required fields in validation order.
    pub const REQUIRED: [Field; 4] = [Field::Title, Field::Summary, Field::Uri, Field::Authors];

    /// Front-matter key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Summary => "summary",
            Field::Uri => "uri",
            Field::Authors => "authors",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Missing or malformed process configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required values are absent or blank.
    #[error("required environment variable(s) not set: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// An optional tuning value could not be parsed.
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Failure to turn a Markdown file into chunks.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No frontmatter found in the markdown document at {}", path.display())]
    MissingFrontmatter { path: PathBuf },

    #[error("invalid frontmatter in the markdown document at {}: {source}", path.display())]
    InvalidFrontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No {field} found in the frontmatter of the markdown document at {}", path.display())]
    MissingField { field: Field, path: PathBuf },

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size}) and chunk_size must be > 0")]
    InvalidChunking { size: usize, overlap: usize },
}

/// Failure talking to the embedding provider or the vector index.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{failed}/{total} documents were rejected by the index")]
    PartialWrite { failed: usize, total: usize },

    #[error("got {contents} contents but {metadatas} metadata records")]
    LengthMismatch { contents: usize, metadatas: usize },
}

/// Why a single file failed to import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failure that stops a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot list markdown files in {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
