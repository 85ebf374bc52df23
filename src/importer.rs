//! Import pipeline orchestration.
//!
//! Coordinates one run: discover Markdown files → snapshot index
//! statistics → for each file parse, clean old chunks, embed and upsert new
//! ones → snapshot statistics again → print the report.
//!
//! Files are processed one at a time in discovery order. Each file moves
//! through [`FileStage`]s; a failure at any stage marks that file failed and
//! the run moves on to the next one. A file whose old chunks were cleaned
//! but whose new chunks could not be indexed stays absent from the index
//! until the next successful run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{Config, ImportConfig, MAX_QUERY_PAGE_SIZE};
use crate::embedding::{AzureOpenAiEmbedder, Embedder};
use crate::error::{ImportError, RemoteError, RunError};
use crate::index::{AzureSearchIndex, VectorIndex};
use crate::loader::markdown_files;
use crate::models::IndexStatistics;
use crate::parser;
use crate::sync::IndexSynchronizer;
use crate::vector_store::VectorStore;

/// How far a file got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Pending,
    Loaded,
    Cleaned,
    Indexed,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStage::Pending => "pending",
            FileStage::Loaded => "loaded",
            FileStage::Cleaned => "cleaned",
            FileStage::Indexed => "indexed",
        };
        f.write_str(name)
    }
}

/// A file that made it all the way into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub chunks: usize,
    /// Whether every previously stored chunk was removed.
    pub cleaned: bool,
}

/// A file that failed, with the last stage it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub stage: FileStage,
    pub reason: String,
}

/// Counters and snapshots for one run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub file_paths: Vec<PathBuf>,
    pub succeeded: Vec<FileOutcome>,
    pub failed: Vec<FailedFile>,
    pub total_chunks: usize,
    pub cleaned: usize,
    pub pre_import_stats: IndexStatistics,
    /// `None` when the index could not be read after the files were processed.
    pub post_import_stats: Option<IndexStatistics>,
}

impl ImportReport {
    fn record(&mut self, outcome: FileOutcome) {
        self.total_chunks += outcome.chunks;
        if outcome.cleaned {
            self.cleaned += 1;
        }
        self.succeeded.push(outcome);
    }

    /// Lines printed to stdout at the end of a run.
    pub fn summary_lines(&self) -> Vec<String> {
        let total = self.file_paths.len();
        let mut lines = Vec::new();

        if !self.failed.is_empty() {
            lines.push(format!("Failed to load {}/{}", self.failed.len(), total));
        }
        if !self.succeeded.is_empty() {
            lines.push(format!(
                "Succeed to load {}/{} markdown files with a total of {} chunks and successful cleaned up {} older markdown files (if present).",
                self.succeeded.len(),
                total,
                self.total_chunks,
                self.cleaned
            ));
        }

        let before = &self.pre_import_stats;
        let after = self.post_import_stats.as_ref();
        lines.push(format!(
            "  Documents:    {} -> {}",
            before.document_count,
            or_unavailable(after, |s| s.document_count.to_string())
        ));
        lines.push(format!(
            "  Storage:      {} -> {}",
            format_bytes(before.storage_size),
            or_unavailable(after, |s| format_bytes(s.storage_size))
        ));
        lines.push(format!(
            "  Vector index: {} -> {}",
            format_bytes(before.vector_index_size),
            or_unavailable(after, |s| format_bytes(s.vector_index_size))
        ));
        lines
    }

    pub fn print(&self) {
        for line in self.summary_lines() {
            println!("{}", line);
        }
        if !self.failed.is_empty() {
            debug!(
                "Failed files: {:?}",
                self.failed.iter().map(|f| &f.path).collect::<Vec<_>>()
            );
        }
        if !self.succeeded.is_empty() {
            debug!(
                "Succeed files: {:?}",
                self.succeeded.iter().map(|f| &f.path).collect::<Vec<_>>()
            );
        }
    }
}

fn or_unavailable(
    stats: Option<&IndexStatistics>,
    value: impl Fn(&IndexStatistics) -> String,
) -> String {
    stats.map_or_else(|| "unavailable".to_string(), value)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub struct Importer {
    repository: String,
    directory: PathBuf,
    settings: ImportConfig,
    index: Arc<dyn VectorIndex>,
    vector_store: VectorStore,
    synchronizer: IndexSynchronizer,
}

impl Importer {
    /// Connect the vector store (probing the embedding dimension and
    /// ensuring the index exists) and build an importer with default
    /// settings.
    pub async fn new(
        repository: impl Into<String>,
        directory: impl Into<PathBuf>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RemoteError> {
        let vector_store = VectorStore::connect(embedder, index.clone()).await?;
        Ok(Self {
            repository: repository.into(),
            directory: directory.into(),
            settings: ImportConfig::default(),
            vector_store,
            synchronizer: IndexSynchronizer::new(index.clone(), MAX_QUERY_PAGE_SIZE),
            index,
        })
    }

    /// Build the Azure clients described by `config` and connect them.
    pub async fn from_config(
        config: &Config,
        repository: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Result<Self, RemoteError> {
        let index: Arc<dyn VectorIndex> = Arc::new(AzureSearchIndex::new(&config.index)?);
        let embedder: Arc<dyn Embedder> = Arc::new(AzureOpenAiEmbedder::new(&config.embedding)?);
        let importer = Self::new(repository, directory, index, embedder).await?;
        Ok(importer
            .with_settings(config.import)
            .with_page_size(config.index.page_size))
    }

    pub fn with_settings(mut self, settings: ImportConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Page size used when looking up previously stored chunks.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.synchronizer = IndexSynchronizer::new(self.index.clone(), page_size);
        self
    }

    pub fn synchronizer(&self) -> &IndexSynchronizer {
        &self.synchronizer
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    /// Run the import over every Markdown file under the directory.
    ///
    /// Only failures before the first file is processed (discovery and the
    /// pre-import statistics) abort the run. Per-file failures are recorded
    /// in the report, and a failed post-import statistics read leaves
    /// `post_import_stats` empty.
    pub async fn run(&self) -> Result<ImportReport, RunError> {
        info!("-----------------Getting Markdown Files-----------------");
        let file_paths: Vec<PathBuf> = markdown_files(&self.directory)
            .map_err(|source| RunError::Io {
                path: self.directory.clone(),
                source,
            })?
            .collect();
        info!(
            "Found {} markdown files in directory {}...",
            file_paths.len(),
            self.directory.display()
        );
        debug!("Files: {:?}", file_paths);

        info!("-----------------Getting Pre-import Statistics-----------------");
        let pre_import_stats = self.synchronizer.statistics(None).await?;

        let mut report = ImportReport {
            file_paths,
            pre_import_stats,
            ..Default::default()
        };

        info!("-----------------Starting Importing Files-----------------");
        for path in report.file_paths.clone() {
            let mut stage = FileStage::Pending;
            match self.process(&path, &mut stage).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("Failed to load document {}: {}", path.display(), e);
                    report.failed.push(FailedFile {
                        path,
                        stage,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!("-----------------Importing files completed-----------------");

        info!("-----------------Getting Post-import Statistics-----------------");
        report.post_import_stats = match self
            .synchronizer
            .statistics(Some(&report.pre_import_stats))
            .await
        {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Failed to get post-import statistics: {}", e);
                None
            }
        };

        Ok(report)
    }

    /// Parse, clean, and index a single file.
    pub async fn import_file(&self, path: &Path) -> Result<FileOutcome, ImportError> {
        let mut stage = FileStage::Pending;
        self.process(path, &mut stage).await
    }

    async fn process(&self, path: &Path, stage: &mut FileStage) -> Result<FileOutcome, ImportError> {
        info!("Loading document {}:{}...", self.repository, path.display());
        let parsed = parser::parse(
            path,
            &self.repository,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;
        *stage = FileStage::Loaded;

        let source = path.to_string_lossy();
        let cleaned = self.synchronizer.clean(&self.repository, &source).await?;
        *stage = FileStage::Cleaned;

        self.vector_store
            .load_chunks(&parsed.contents, &parsed.metadatas)
            .await?;
        *stage = FileStage::Indexed;

        Ok(FileOutcome {
            path: path.to_path_buf(),
            chunks: parsed.len(),
            cleaned,
        })
    }
}
