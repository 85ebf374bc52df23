//! # Docs Importer
//!
//! Imports a tree of Markdown documents into a remote vector index.
//!
//! Each document must open with YAML front-matter carrying `title`,
//! `summary`, `uri`, and `authors`. Bodies are split along Markdown headings
//! and then by character budget; every chunk is stored with provenance
//! metadata so that a later run can delete and replace exactly the chunks of
//! one `(repository, source)` pair.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────────┐
//! │ Loader  │──▶│    Parser    │──▶│   Sync    │──▶│ Vector store │
//! │ *.md    │   │ FM + chunks  │   │ clean old │   │ embed+upsert │
//! └─────────┘   └──────────────┘   └───────────┘   └──────┬───────┘
//!                                                          ▼
//!                                           ┌──────────────────────────┐
//!                                           │ Azure OpenAI / AI Search │
//!                                           └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`error`] | Error types |
//! | [`models`] | Core data types |
//! | [`loader`] | Markdown file discovery |
//! | [`frontmatter`] | Front-matter extraction and validation |
//! | [`chunk`] | Heading-aware and recursive text splitting |
//! | [`metadata`] | Per-chunk provenance records |
//! | [`parser`] | Single-file parse pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction and backends |
//! | [`sync`] | Removal of previously indexed chunks |
//! | [`vector_store`] | Embedding and upsert of chunks |
//! | [`importer`] | Run orchestration and report |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod frontmatter;
pub mod importer;
pub mod index;
pub mod loader;
pub mod metadata;
pub mod models;
pub mod parser;
pub mod sync;
pub mod vector_store;
