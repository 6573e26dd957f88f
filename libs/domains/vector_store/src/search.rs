use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use observability::VectorStoreMetrics;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::embedding::QueryEmbedder;
use crate::error::{StoreError, StoreResult};
use crate::models::{Neighbor, SearchOutcome, SearchQuery, SearchResult};
use crate::registry::ProviderRegistry;

/// A finished search as handed to a [`ResultSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    pub query: String,
    pub collection_id: String,
    pub timestamp: DateTime<Local>,
    pub results: Vec<SearchResult>,
}

/// Persists search results outside the engine
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink: Send + Sync {
    /// Store the record, returning where it was written
    fn save(&self, record: &SearchRecord) -> StoreResult<PathBuf>;
}

pub struct SearchEngine {
    registry: Arc<ProviderRegistry>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl SearchEngine {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry, sink: None }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Embed the query, run top-k against the collection and filter the hits.
    ///
    /// Backend order is kept. An empty result set is a success.
    #[instrument(
        skip(self, query, embedder),
        fields(provider = %query.provider, collection = %query.collection_id, top_k = query.top_k)
    )]
    pub async fn search(
        &self,
        query: &SearchQuery,
        embedder: &dyn QueryEmbedder,
    ) -> StoreResult<SearchOutcome> {
        query.validate()?;

        let vector = embedder.embed(&query.query_text).await?;

        let hits = {
            let adapter = self.registry.acquire(query.provider).await?;

            let descriptor = adapter
                .describe_collection(&query.collection_id)
                .await
                .inspect_err(|e| {
                    warn!(
                        provider = %query.provider,
                        collection = %query.collection_id,
                        error = %e,
                        "Cannot describe collection"
                    );
                })?;

            if vector.len() != descriptor.dimension {
                return Err(StoreError::Validation(format!(
                    "Query vector has {} dimensions, collection '{}' expects {}",
                    vector.len(),
                    descriptor.name,
                    descriptor.dimension
                )));
            }

            let handle = descriptor.handle(descriptor.name.clone());
            adapter
                .search(&handle, &vector, query.top_k)
                .await
                .inspect_err(|e| {
                    error!(
                        provider = %query.provider,
                        collection = %handle.name,
                        top_k = query.top_k,
                        error = %e,
                        "Backend search failed"
                    );
                })?
        };

        let returned = hits.len();
        let results = filter_hits(hits, query);
        let filtered = returned - results.len();
        VectorStoreMetrics::record_search(query.provider.as_ref(), results.len(), filtered);
        debug!(returned, kept = results.len(), "Filtered search hits");

        let saved_filepath = if query.save_results && !results.is_empty() {
            self.save(query, &results)?
        } else {
            None
        };

        Ok(SearchOutcome {
            results,
            saved_filepath,
        })
    }

    fn save(&self, query: &SearchQuery, results: &[SearchResult]) -> StoreResult<Option<PathBuf>> {
        let Some(sink) = &self.sink else {
            warn!("save_results requested but no result sink is configured");
            return Ok(None);
        };

        let record = SearchRecord {
            query: query.query_text.clone(),
            collection_id: query.collection_id.clone(),
            timestamp: Local::now(),
            results: results.to_vec(),
        };
        let path = sink.save(&record)?;
        info!(path = %path.display(), "Saved search results");
        Ok(Some(path))
    }
}

/// Drop hits under either threshold, keep order, cap at `top_k`
fn filter_hits(hits: Vec<Neighbor>, query: &SearchQuery) -> Vec<SearchResult> {
    hits.into_iter()
        .filter(|hit| hit.similarity() >= query.score_threshold)
        .filter(|hit| word_count(&hit.content) >= query.word_count_threshold)
        .take(query.top_k)
        .map(|hit| SearchResult {
            score: hit.similarity(),
            content: hit.content,
            metadata: hit.metadata,
        })
        .collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
