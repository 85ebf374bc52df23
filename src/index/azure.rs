//! Azure AI Search backend.
//!
//! Talks to the service REST API directly with `reqwest`, authenticating
//! with the admin key in the `api-key` header.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | ensure index | `GET /indexes/{name}`, then `PUT` on 404 |
//! | upsert / delete | `POST /indexes/{name}/docs/index` |
//! | query | `POST /indexes/{name}/docs/search` |
//! | statistics | `GET /indexes/{name}/stats` |
//! | drop index | `DELETE /indexes/{name}` |

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::schema::{KEY_FIELD, VECTOR_FIELD};
use super::{IndexQuery, IndexSchema, VectorIndex};
use crate::config::IndexConfig;
use crate::error::RemoteError;
use crate::models::{IndexStatistics, IndexedChunk, WriteOutcome};

pub const API_VERSION: &str = "2024-07-01";

/// Maximum number of actions per `docs/index` request.
const MAX_BATCH: usize = 1000;

pub struct AzureSearchIndex {
    client: reqwest::Client,
    address: String,
    api_key: String,
    index_name: String,
}

impl AzureSearchIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        info!(
            "Vector store initialized: {} (endpoint), {} (index)",
            config.address, config.index_name
        );
        Ok(Self {
            client,
            address: config.address.clone(),
            api_key: config.password.clone(),
            index_name: config.index_name.clone(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.address, self.index_name, suffix, API_VERSION
        )
    }

    async fn send_actions(&self, actions: Vec<Value>) -> Result<Vec<WriteOutcome>, RemoteError> {
        let mut outcomes = Vec::with_capacity(actions.len());

        for batch in actions.chunks(MAX_BATCH) {
            let response = self
                .client
                .post(self.url("/docs/index"))
                .header("api-key", &self.api_key)
                .json(&json!({ "value": batch }))
                .send()
                .await?;

            // 207 Multi-Status carries per-document failures in the body.
            let response = check(response).await?;
            let parsed: IndexingResponse = response.json().await?;
            outcomes.extend(parsed.value.into_iter().map(WriteOutcome::from));
        }

        Ok(outcomes)
    }
}

/// Turn a non-success status into [`RemoteError::Status`].
async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<IndexingResult> for WriteOutcome {
    fn from(result: IndexingResult) -> Self {
        WriteOutcome {
            key: result.key,
            succeeded: result.status,
            error_message: result.error_message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<Value>,
}

/// JSON body for `docs/search`.
fn search_body(query: &IndexQuery) -> Value {
    let mut body = json!({
        "search": "*",
        "top": query.top,
        "skip": query.skip,
    });

    if let Some(filter) = query.filter.as_ref().filter(|f| !f.is_empty()) {
        body["filter"] = json!(filter.to_odata());
    }
    if !query.select.is_empty() {
        body["select"] = json!(query.select.join(","));
    }
    match &query.vector {
        // Every hit of a `*` search scores the same, so paging with `skip`
        // needs a stable sort.
        None => body["orderby"] = json!(format!("{} asc", KEY_FIELD)),
        Some(vector) => {
            body["search"] = Value::Null;
            body["vectorQueries"] = json!([{
                "kind": "vector",
                "vector": vector.vector,
                "k": vector.k,
                "fields": VECTOR_FIELD,
            }]);
        }
    }
    body
}

#[async_trait]
impl VectorIndex for AzureSearchIndex {
    fn name(&self) -> &str {
        &self.index_name
    }

    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(self.url(""))
            .header("api-key", &self.api_key)
            .send()
            .await?;

        if response.status() != StatusCode::NOT_FOUND {
            check(response).await?;
            debug!("Index {} already exists", self.index_name);
            return Ok(());
        }

        info!(
            "Creating index {} ({} dimensions)",
            self.index_name,
            schema.dimensions()
        );
        let response = self
            .client
            .put(self.url(""))
            .header("api-key", &self.api_key)
            .json(&schema.definition(&self.index_name))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn upsert(&self, chunks: &[IndexedChunk]) -> Result<Vec<WriteOutcome>, RemoteError> {
        let mut actions = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut action = serde_json::to_value(chunk)
                .map_err(|e| RemoteError::Decode(e.to_string()))?;
            action["@search.action"] = json!("upload");
            actions.push(action);
        }
        self.send_actions(actions).await
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .client
            .post(self.url("/docs/search"))
            .header("api-key", &self.api_key)
            .json(&search_body(query))
            .send()
            .await?;
        let response = check(response).await?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.value)
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<WriteOutcome>, RemoteError> {
        let actions = keys
            .iter()
            .map(|key| json!({ "@search.action": "delete", KEY_FIELD: key }))
            .collect();
        self.send_actions(actions).await
    }

    async fn statistics(&self) -> Result<IndexStatistics, RemoteError> {
        let response = self
            .client
            .get(self.url("/stats"))
            .header("api-key", &self.api_key)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_index(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.url(""))
            .header("api-key", &self.api_key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Index {} does not exist", self.index_name);
            return Ok(());
        }
        check(response).await?;
        info!("Deleted index {}", self.index_name);
        Ok(())
    }
}
