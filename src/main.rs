//! # Docs Importer CLI (`docs-importer`)
//!
//! Imports a directory of Markdown documents into an Azure AI Search vector
//! index, replacing whatever was previously indexed for each file.
//!
//! ## Usage
//!
//! ```bash
//! docs-importer -r <repository> -d <directory> [-l <loglevel>]
//! ```
//!
//! Connection settings come from the environment; a `.env` file in the
//! working directory is loaded first and its values take precedence.
//!
//! ## Examples
//!
//! ```bash
//! # Import the docs folder of a repository
//! docs-importer -r defra/adp-documentation -d ./docs
//!
//! # Same, with progress logged to stderr
//! docs-importer -r defra/adp-documentation -d ./docs -l info
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use docs_importer::config::Config;
use docs_importer::importer::Importer;

/// Import Markdown documents with YAML front-matter into a vector index.
#[derive(Parser, Debug)]
#[command(name = "docs-importer", version)]
struct Cli {
    /// Repository name stored with every chunk (e.g. `owner/name`).
    #[arg(short, long)]
    repository: String,

    /// Directory scanned recursively for `.md` files.
    #[arg(short, long)]
    directory: PathBuf,

    /// Log level: trace, debug, info, warning, error, or critical.
    ///
    /// `RUST_LOG` overrides this when set.
    #[arg(short, long, default_value = "warning", value_parser = parse_level)]
    loglevel: LevelFilter,
}

/// Map a level name (case-insensitive) onto a tracing level filter.
fn parse_level(name: &str) -> Result<LevelFilter, String> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warning" | "warn" => Ok(LevelFilter::WARN),
        "error" | "critical" => Ok(LevelFilter::ERROR),
        other => Err(format!(
            "unknown log level '{}' (expected trace, debug, info, warning, error, critical)",
            other
        )),
    }
}

/// Logs go to stderr so the report on stdout stays clean.
fn init_tracing(level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is not an error.
    dotenvy::dotenv_override().ok();
    init_tracing(cli.loglevel);

    let config = Config::from_env()?;
    let importer = Importer::from_config(&config, cli.repository, cli.directory).await?;
    let report = importer.run().await?;
    report.print();

    Ok(())
}
