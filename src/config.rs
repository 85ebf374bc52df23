//! Process configuration.
//!
//! Configuration is read from environment variables (the binary loads a
//! `.env` file first). Seven values are required; every one that is absent
//! or blank is reported together in a single [`ConfigError::Missing`].
//! Tuning values are optional and fall back to defaults.

use std::time::Duration;

use crate::error::ConfigError;

pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const AZURE_DEPLOYMENT: &str = "AZURE_DEPLOYMENT";
pub const VECTOR_STORE_ADDRESS: &str = "VECTOR_STORE_ADDRESS";
pub const VECTOR_STORE_PASSWORD: &str = "VECTOR_STORE_PASSWORD";
pub const INDEX_NAME: &str = "INDEX_NAME";

/// Required variables in the order they are reported.
pub const REQUIRED_VARS: [&str; 7] = [
    AZURE_OPENAI_ENDPOINT,
    AZURE_OPENAI_API_KEY,
    AZURE_OPENAI_API_VERSION,
    AZURE_DEPLOYMENT,
    VECTOR_STORE_ADDRESS,
    VECTOR_STORE_PASSWORD,
    INDEX_NAME,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub import: ImportConfig,
}

/// Azure OpenAI embedding deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

/// Azure AI Search service and index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub address: String,
    pub password: String,
    pub index_name: String,
    pub page_size: usize,
    pub timeout_secs: u64,
}

/// Splitting parameters used for every file of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_batch_size() -> usize {
    16
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
/// Azure AI Search returns at most this many hits per search request.
pub const MAX_QUERY_PAGE_SIZE: usize = 1000;

fn default_page_size() -> usize {
    MAX_QUERY_PAGE_SIZE
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Required values are trimmed; a value that is blank after trimming
    /// counts as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| -> String {
            match lookup(name).map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let endpoint = required(AZURE_OPENAI_ENDPOINT);
        let api_key = required(AZURE_OPENAI_API_KEY);
        let api_version = required(AZURE_OPENAI_API_VERSION);
        let deployment = required(AZURE_DEPLOYMENT);
        let address = required(VECTOR_STORE_ADDRESS);
        let password = required(VECTOR_STORE_PASSWORD);
        let index_name = required(INDEX_NAME);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let timeout_secs = optional(&lookup, "REQUEST_TIMEOUT_SECS", default_timeout_secs)?;
        let chunk_size = optional(&lookup, "CHUNK_SIZE", default_chunk_size)?;
        let chunk_overlap = optional(&lookup, "CHUNK_OVERLAP", || 0usize)?;
        let batch_size = optional(&lookup, "EMBEDDING_BATCH_SIZE", default_batch_size)?;
        let page_size = optional(&lookup, "QUERY_PAGE_SIZE", default_page_size)?;

        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                name: "CHUNK_SIZE",
                value: chunk_size.to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid {
                name: "CHUNK_OVERLAP",
                value: chunk_overlap.to_string(),
            });
        }
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "EMBEDDING_BATCH_SIZE",
                value: batch_size.to_string(),
            });
        }
        if page_size == 0 || page_size > MAX_QUERY_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                name: "QUERY_PAGE_SIZE",
                value: page_size.to_string(),
            });
        }

        Ok(Config {
            embedding: EmbeddingConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key,
                api_version,
                deployment,
                batch_size,
                max_retries: optional(&lookup, "EMBEDDING_MAX_RETRIES", default_max_retries)?,
                timeout_secs,
            },
            index: IndexConfig {
                address: address.trim_end_matches('/').to_string(),
                password,
                index_name,
                page_size,
                timeout_secs,
            },
            import: ImportConfig {
                chunk_size,
                chunk_overlap,
            },
        })
    }
}

fn optional<F, T, D>(lookup: &F, name: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    D: FnOnce() -> T,
{
    match lookup(name).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
        _ => Ok(default()),
    }
}
