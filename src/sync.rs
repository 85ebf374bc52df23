//! Removal of previously indexed chunks and index statistics.
//!
//! Before a document is re-indexed, every chunk stored under the same
//! `(repository, source)` pair is deleted so the index never holds stale
//! chunks alongside fresh ones.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MAX_QUERY_PAGE_SIZE;
use crate::error::RemoteError;
use crate::index::schema::KEY_FIELD;
use crate::index::{FieldFilter, IndexQuery, VectorIndex};
use crate::models::IndexStatistics;

pub struct IndexSynchronizer {
    index: Arc<dyn VectorIndex>,
    page_size: usize,
}

impl IndexSynchronizer {
    /// `page_size` is clamped to `1..=MAX_QUERY_PAGE_SIZE`. A larger page
    /// would come back capped and be taken for the last one.
    pub fn new(index: Arc<dyn VectorIndex>, page_size: usize) -> Self {
        Self {
            index,
            page_size: page_size.clamp(1, MAX_QUERY_PAGE_SIZE),
        }
    }

    /// Keys of every chunk stored for `(repository, source)`, paging through
    /// the whole result set.
    pub async fn find_keys(&self, repository: &str, source: &str) -> Result<Vec<String>, RemoteError> {
        let filter = FieldFilter::new()
            .eq("repository", repository)
            .eq("source", source);
        let mut keys = Vec::new();
        let mut skip = 0;

        loop {
            let query = IndexQuery::filtered(filter.clone(), self.page_size)
                .select(&[KEY_FIELD])
                .skip(skip);
            let page = self.index.query(&query).await?;
            let fetched = page.len();

            for document in page {
                match document.get(KEY_FIELD).and_then(|k| k.as_str()) {
                    Some(key) => keys.push(key.to_string()),
                    None => {
                        return Err(RemoteError::Decode(format!(
                            "search result without '{}' field",
                            KEY_FIELD
                        )))
                    }
                }
            }

            if fetched < self.page_size {
                break;
            }
            skip += fetched;
        }

        Ok(keys)
    }

    /// Delete every chunk previously stored for `(repository, source)`.
    ///
    /// Returns `true` when nothing was stored or every delete succeeded,
    /// `false` when at least one key could not be deleted. Transport and
    /// auth failures are returned as errors.
    pub async fn clean(&self, repository: &str, source: &str) -> Result<bool, RemoteError> {
        info!("Cleaning documents for {}:{}...", repository, source);

        let keys = self.find_keys(repository, source).await?;
        if keys.is_empty() {
            info!("No documents found for {}: {}", repository, source);
            return Ok(true);
        }

        let outcomes = self.index.delete(&keys).await?;
        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        let succeeded = outcomes.len() - failed;

        if failed > 0 {
            warn!(
                "Failed to delete {}/{} for {}:{}",
                failed,
                keys.len(),
                repository,
                source
            );
            for outcome in outcomes.iter().filter(|o| !o.succeeded) {
                debug!(
                    "Delete of {} failed: {}",
                    outcome.key,
                    outcome.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        info!(
            "Succeeded to delete {}/{} in {}:{}",
            succeeded,
            keys.len(),
            repository,
            source
        );

        Ok(failed == 0)
    }

    /// Read the current index statistics, logging them next to `previous`
    /// when given.
    pub async fn statistics(
        &self,
        previous: Option<&IndexStatistics>,
    ) -> Result<IndexStatistics, RemoteError> {
        info!("Getting statistics for index {}...", self.index.name());
        let stats = self.index.statistics().await?;
        match previous {
            Some(old) => info!(
                "Statistics for index {} retrieved: {:?} old stats: {:?}",
                self.index.name(),
                stats,
                old
            ),
            None => info!(
                "Statistics for index {} retrieved: {:?}",
                self.index.name(),
                stats
            ),
        }
        Ok(stats)
    }

    /// Drop the whole index.
    pub async fn delete_index(&self) -> Result<(), RemoteError> {
        warn!("Deleting index {}", self.index.name());
        self.index.delete_index().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexOperation, IndexSchema, InMemoryIndex};
    use crate::models::{ChunkMetadata, IndexedChunk, WriteOutcome};
    use async_trait::async_trait;

    fn chunk(id: &str, repository: &str, source: &str) -> IndexedChunk {
        let meta = ChunkMetadata {
            title: "T".into(),
            source: source.into(),
            uri: "https://example.org".into(),
            repository: repository.into(),
            path: source.into(),
            summary: "S".into(),
            authors: vec!["A".into()],
            last_update: "2024-01-01T00:00:00-00:00".into(),
            heading: Default::default(),
            chunk_number: 1,
        };
        IndexedChunk::new(id.into(), "text".into(), vec![1.0], &meta).unwrap()
    }

    #[tokio::test]
    async fn test_clean_without_matches_skips_delete() {
        let index = Arc::new(InMemoryIndex::default());
        index.upsert(&[chunk("1", "r", "other.md")]).await.unwrap();
        let sync = IndexSynchronizer::new(index.clone(), 1000);

        assert!(sync.clean("r", "a.md").await.unwrap());
        assert!(!index
            .operations()
            .iter()
            .any(|op| matches!(op, IndexOperation::Delete { .. })));
        assert_eq!(index.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_removes_only_matching_chunks() {
        let index = Arc::new(InMemoryIndex::default());
        index
            .upsert(&[
                chunk("1", "r", "a.md"),
                chunk("2", "r", "a.md"),
                chunk("3", "other", "a.md"),
                chunk("4", "r", "b.md"),
            ])
            .await
            .unwrap();
        let sync = IndexSynchronizer::new(index.clone(), 1000);

        assert!(sync.clean("r", "a.md").await.unwrap());
        let remaining: Vec<_> = index
            .documents()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(remaining, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_clean_pages_past_first_page() {
        let index = Arc::new(InMemoryIndex::default());
        let chunks: Vec<_> = (0..7).map(|i| chunk(&i.to_string(), "r", "a.md")).collect();
        index.upsert(&chunks).await.unwrap();
        let sync = IndexSynchronizer::new(index.clone(), 3);

        assert_eq!(sync.find_keys("r", "a.md").await.unwrap().len(), 7);
        assert!(sync.clean("r", "a.md").await.unwrap());
        assert!(index.documents().is_empty());
    }

    #[tokio::test]
    async fn test_find_keys_follows_capped_azure_pages() {
        use crate::config::IndexConfig;
        use crate::index::AzureSearchIndex;
        use mockito::Matcher;
        use serde_json::json;

        let mut server = mockito::Server::new_async().await;
        let first_page: Vec<_> = (0..1000).map(|i| json!({ "id": format!("k{}", i) })).collect();
        let first = server
            .mock("POST", "/indexes/docs/docs/search")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({ "top": 1000, "skip": 0 })))
            .with_status(200)
            .with_body(
                json!({
                    "value": first_page,
                    "@search.nextPageParameters": { "skip": 1000, "top": 4000 }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("POST", "/indexes/docs/docs/search")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({ "top": 1000, "skip": 1000 })))
            .with_status(200)
            .with_body(r#"{"value": [{"id": "k1000"}, {"id": "k1001"}]}"#)
            .create_async()
            .await;

        let index = AzureSearchIndex::new(&IndexConfig {
            address: server.url(),
            password: "admin-key".to_string(),
            index_name: "docs".to_string(),
            page_size: 5000,
            timeout_secs: 5,
        })
        .unwrap();
        let sync = IndexSynchronizer::new(Arc::new(index), 5000);

        let keys = sync.find_keys("r", "a.md").await.unwrap();
        assert_eq!(keys.len(), 1002);
        assert_eq!(keys.last().map(String::as_str), Some("k1001"));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_clean_escapes_quotes_in_source() {
        let index = Arc::new(InMemoryIndex::default());
        index.upsert(&[chunk("1", "r", "it's.md")]).await.unwrap();
        let sync = IndexSynchronizer::new(index.clone(), 1000);

        sync.clean("r", "it's.md").await.unwrap();
        assert!(index.operations().contains(&IndexOperation::Query {
            filter: Some("repository eq 'r' and source eq 'it''s.md'".to_string())
        }));
        assert!(index.documents().is_empty());
    }

    /// Index whose deletes fail for one key.
    struct RejectingIndex {
        inner: InMemoryIndex,
        rejected: String,
    }

    #[async_trait]
    impl VectorIndex for RejectingIndex {
        fn name(&self) -> &str {
            "rejecting"
        }
        async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), RemoteError> {
            self.inner.ensure_index(schema).await
        }
        async fn upsert(&self, chunks: &[IndexedChunk]) -> Result<Vec<WriteOutcome>, RemoteError> {
            self.inner.upsert(chunks).await
        }
        async fn query(&self, query: &IndexQuery) -> Result<Vec<serde_json::Value>, RemoteError> {
            self.inner.query(query).await
        }
        async fn delete(&self, keys: &[String]) -> Result<Vec<WriteOutcome>, RemoteError> {
            Ok(keys
                .iter()
                .map(|k| WriteOutcome {
                    key: k.clone(),
                    succeeded: *k != self.rejected,
                    error_message: None,
                })
                .collect())
        }
        async fn statistics(&self) -> Result<IndexStatistics, RemoteError> {
            self.inner.statistics().await
        }
        async fn delete_index(&self) -> Result<(), RemoteError> {
            self.inner.delete_index().await
        }
    }

    #[tokio::test]
    async fn test_partial_delete_failure_returns_false() {
        let index = RejectingIndex {
            inner: InMemoryIndex::default(),
            rejected: "2".to_string(),
        };
        index
            .upsert(&[chunk("1", "r", "a.md"), chunk("2", "r", "a.md")])
            .await
            .unwrap();
        let sync = IndexSynchronizer::new(Arc::new(index), 1000);

        assert!(!sync.clean("r", "a.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_statistics_and_delete_index() {
        let index = Arc::new(InMemoryIndex::default());
        index.upsert(&[chunk("1", "r", "a.md")]).await.unwrap();
        let sync = IndexSynchronizer::new(index.clone(), 1000);

        let before = sync.statistics(None).await.unwrap();
        assert_eq!(before.document_count, 1);

        sync.delete_index().await.unwrap();
        let after = sync.statistics(Some(&before)).await.unwrap();
        assert_eq!(after.document_count, 0);
    }
}
