//! Embedding provider abstraction and the Azure OpenAI implementation.
//!
//! Defines the [`Embedder`] trait and:
//! - **[`AzureOpenAiEmbedder`]** calls an Azure OpenAI embeddings
//!   deployment with batching, retry, and backoff.
//! - [`cosine_similarity`] computes vector similarity for the in-memory index.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::EmbeddingConfig;
use crate::error::RemoteError;

/// Computes embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model or deployment identifier.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError>;

    /// Embed a single text (e.g. a search query).
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RemoteError> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode("empty embedding response".to_string()))
    }
}

/// Embedder backed by an Azure OpenAI deployment.
///
/// Calls `POST {endpoint}/openai/deployments/{deployment}/embeddings` with
/// the configured `api-version`, authenticating with the `api-key` header.
pub struct AzureOpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
    batch_size: usize,
    max_retries: u32,
}

impl AzureOpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            config.endpoint, config.deployment, config.api_version
        );
        info!(
            "Embeddings initialized: {} (endpoint), {} (deployment)",
            config.endpoint, config.deployment
        );
        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            deployment: config.deployment.clone(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    /// Send one batch with retry/backoff.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        let body = serde_json::json!({ "input": texts });
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!("Retrying embedding request in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingResponse = response.json().await?;
                        return order_embeddings(parsed, texts.len());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = RemoteError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!("Embedding request failed (attempt {}): {}", attempt + 1, err);
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    warn!("Embedding request failed (attempt {}): {}", attempt + 1, e);
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| RemoteError::Decode("embedding failed after retries".to_string())))
    }
}

#[async_trait]
impl Embedder for AzureOpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Put vectors back in input order using the response `index` field.
fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RemoteError> {
    if response.data.len() != expected {
        return Err(RemoteError::Decode(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    let mut data = response.data;
    if data.iter().all(|item| item.index.is_some()) {
        data.sort_by_key(|item| item.index);
    }
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
