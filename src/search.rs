//! Search fan-in and merge.
//!
//! A search reconstructs a combined index on demand: enumerate every known
//! document id, fetch and decrypt each per-document index, merge the
//! survivors, and run the query against the merge. Corrupt or missing
//! per-document data must never deny search over the rest of the corpus, so
//! every per-id failure is collected as a skip reason and logged rather than
//! raised.
//!
//! The merge-on-query strategy lives behind the [`IndexProvider`] trait so a
//! deployment can swap in a cached or incrementally maintained index without
//! touching query execution.

use std::sync::Arc;

use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{Index, TantivyDocument};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::{self, CryptoError, EncryptionKey};
use crate::error::SearchError;
use crate::index::{self, IndexError, CONTENT_FIELD, DOCUMENT_ID_FIELD, FILE_NAME_FIELD};
use crate::models::{SearchResponse, SearchResult};
use crate::store::{StorageGateway, StoreError};

/// Maximum characters of stored content carried into a snippet.
const SNIPPET_MAX_CHARS: usize = 200;

/// Why one document's index was skipped during fan-in.
#[derive(Debug, Error)]
enum DocumentLoadError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("decrypt: {0}")]
    Decrypt(#[from] CryptoError),

    #[error("deserialize: {0}")]
    Deserialize(#[from] IndexError),
}

/// Strategy that produces the queryable index for one search request.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// Build the index a query should run against, or `None` when the
    /// corpus has no readable documents.
    async fn provide(&self) -> Result<Option<Index>, SearchError>;
}

/// Full fan-in: fetch, decrypt, deserialize, and merge every per-document
/// index on every call.
///
/// This pays O(corpus size) per search in exchange for having no shared
/// mutable index and no index-mutation concurrency control. The merged index
/// is discarded after the request; nothing is cached across calls.
pub struct FanInProvider {
    storage: StorageGateway,
}

impl FanInProvider {
    pub fn new(storage: StorageGateway) -> Self {
        Self { storage }
    }

    /// Fetch, decrypt, and deserialize one document's index.
    async fn load_document_index(&self, document_id: &str) -> Result<Index, DocumentLoadError> {
        let sealed = self.storage.download_index(document_id).await?;
        let key_bytes = self.storage.download_key(document_id).await?;
        let key = EncryptionKey::from_bytes(key_bytes)?;
        let serialized = crypto::decrypt(&sealed, &key)?;
        Ok(index::deserialize_index(&serialized)?)
    }
}

#[async_trait]
impl IndexProvider for FanInProvider {
    async fn provide(&self) -> Result<Option<Index>, SearchError> {
        let document_ids = self.storage.list_document_ids().await;
        if document_ids.is_empty() {
            info!("no documents indexed yet");
            return Ok(None);
        }

        let mut indexes = Vec::with_capacity(document_ids.len());
        for document_id in &document_ids {
            match self.load_document_index(document_id).await {
                Ok(per_doc_index) => indexes.push(per_doc_index),
                Err(error) => {
                    warn!(%document_id, %error, "skipping unreadable document index")
                }
            }
        }

        if indexes.is_empty() {
            warn!("no valid indexes found");
            return Ok(None);
        }

        let merged = index::merge_indexes(&indexes).map_err(SearchError::Merge)?;
        Ok(Some(merged))
    }
}

/// Answers queries against whatever index the configured provider yields.
#[derive(Clone)]
pub struct SearchEngine {
    provider: Arc<dyn IndexProvider>,
}

impl SearchEngine {
    /// Engine with the default full fan-in strategy.
    pub fn new(storage: StorageGateway) -> Self {
        Self::with_provider(Arc::new(FanInProvider::new(storage)))
    }

    /// Engine with a custom index provision strategy.
    pub fn with_provider(provider: Arc<dyn IndexProvider>) -> Self {
        Self { provider }
    }

    /// Run one search over the whole corpus.
    ///
    /// An empty corpus, or a corpus where no index survived loading, yields
    /// an empty result set — not an error. Hard failures only come from the
    /// merge and query stages themselves.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<SearchResponse, SearchError> {
        debug!(query, max_results, "searching");

        let merged = match self.provider.provide().await? {
            Some(merged) => merged,
            None => return Ok(empty_response()),
        };

        let results = execute_query(&merged, query, max_results)?;

        info!(hits = results.len(), "search completed");
        Ok(SearchResponse {
            total_hits: results.len() as u64,
            results,
        })
    }
}

fn empty_response() -> SearchResponse {
    SearchResponse {
        total_hits: 0,
        results: Vec::new(),
    }
}

/// Parse the query against the merged index's content field and shape the
/// top hits. Ties between equal scores fall back to the engine's internal
/// order, which is not guaranteed stable across runs.
fn execute_query(
    merged: &Index,
    query_str: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    if max_results == 0 {
        return Ok(Vec::new());
    }

    let schema = merged.schema();
    let content_field = schema.get_field(CONTENT_FIELD).map_err(SearchError::Execute)?;
    let id_field = schema
        .get_field(DOCUMENT_ID_FIELD)
        .map_err(SearchError::Execute)?;
    let name_field = schema
        .get_field(FILE_NAME_FIELD)
        .map_err(SearchError::Execute)?;

    let parser = QueryParser::for_index(merged, vec![content_field]);
    let query = parser.parse_query(query_str)?;

    let reader = merged.reader().map_err(SearchError::Execute)?;
    let searcher = reader.searcher();
    let top_docs = searcher
        .search(&query, &TopDocs::with_limit(max_results))
        .map_err(SearchError::Execute)?;

    let mut results = Vec::with_capacity(top_docs.len());
    for (score, address) in top_docs {
        let document: TantivyDocument = searcher.doc(address).map_err(SearchError::Execute)?;
        let content = stored_text(&document, content_field).unwrap_or_default();
        results.push(SearchResult {
            document_id: stored_text(&document, id_field).unwrap_or_else(|| "unknown".into()),
            file_name: stored_text(&document, name_field).unwrap_or_else(|| "unknown".into()),
            score,
            snippet: make_snippet(&content),
        });
    }
    Ok(results)
}

fn stored_text(document: &TantivyDocument, field: tantivy::schema::Field) -> Option<String> {
    document
        .get_first(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// First 200 characters of the content, `"..."` appended when truncated,
/// verbatim otherwise.
fn make_snippet(content: &str) -> String {
    let mut chars = content.chars();
    let mut snippet: String = chars.by_ref().take(SNIPPET_MAX_CHARS).collect();
    if chars.next().is_some() {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_verbatim() {
        assert_eq!(make_snippet("short note"), "short note");
        assert_eq!(make_snippet(""), "");
    }

    #[test]
    fn exactly_200_chars_is_not_truncated() {
        let content = "x".repeat(200);
        assert_eq!(make_snippet(&content), content);
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let content = "y".repeat(201);
        let snippet = make_snippet(&content);
        assert_eq!(snippet.chars().count(), 203);
        assert!(snippet.ends_with("..."));
        assert_eq!(&snippet[..200], &content[..200]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "ä".repeat(250);
        let snippet = make_snippet(&content);
        assert_eq!(snippet.chars().count(), 203);
    }

    #[test]
    fn zero_limit_yields_no_results() {
        let merged = index::merge_indexes(&[]).unwrap();
        let results = execute_query(&merged, "anything", 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn malformed_query_is_a_query_error() {
        let merged =
            index::merge_indexes(&[index::build_index("d", "f", "some text").unwrap()]).unwrap();
        let err = execute_query(&merged, "AND", 5).unwrap_err();
        assert!(matches!(err, SearchError::Query(_)));
    }

    #[tokio::test]
    async fn custom_provider_feeds_the_engine() {
        struct Fixed(Option<()>);

        #[async_trait]
        impl IndexProvider for Fixed {
            async fn provide(&self) -> Result<Option<Index>, SearchError> {
                Ok(self.0.map(|_| {
                    index::build_index("fixed-doc", "fixed.txt", "a provider-supplied corpus")
                        .unwrap()
                }))
            }
        }

        let engine = SearchEngine::with_provider(Arc::new(Fixed(Some(()))));
        let response = engine.search("corpus", 5).await.unwrap();
        assert_eq!(response.total_hits, 1);
        assert_eq!(response.results[0].document_id, "fixed-doc");

        let empty = SearchEngine::with_provider(Arc::new(Fixed(None)));
        let response = empty.search("corpus", 5).await.unwrap();
        assert_eq!(response.total_hits, 0);
    }
}
