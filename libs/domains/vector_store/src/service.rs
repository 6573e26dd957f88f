use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::embedding::QueryEmbedder;
use crate::error::StoreResult;
use crate::indexing::IndexingEngine;
use crate::models::{
    CollectionDescriptor, CollectionSummary, IndexResult, Provider, ProviderInfo, SearchOutcome,
    SearchQuery,
};
use crate::payload::{EmbeddingPayload, load_payload};
use crate::registry::ProviderRegistry;
use crate::search::{ResultSink, SearchEngine};

/// Entry point for applications: registry plus both engines
pub struct VectorStoreService {
    registry: Arc<ProviderRegistry>,
    indexing: IndexingEngine,
    search: SearchEngine,
}

impl VectorStoreService {
    pub fn new(registry: ProviderRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            indexing: IndexingEngine::new(Arc::clone(&registry)),
            search: SearchEngine::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn with_result_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.search = self.search.with_sink(sink);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.indexing = self.indexing.with_batch_size(batch_size);
        self
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.registry.providers()
    }

    /// Load an embedding export from disk and index it
    pub async fn index_file(
        &self,
        path: impl AsRef<Path>,
        provider: Provider,
        index_mode: &str,
    ) -> StoreResult<IndexResult> {
        let path = path.as_ref();
        let payload = load_payload(path)?;
        info!(path = %path.display(), records = payload.records.len(), "Loaded embedding export");
        self.index_payload(payload, provider, index_mode).await
    }

    pub async fn index_payload(
        &self,
        payload: EmbeddingPayload,
        provider: Provider,
        index_mode: &str,
    ) -> StoreResult<IndexResult> {
        self.indexing.index_payload(payload, provider, index_mode).await
    }

    pub async fn search(
        &self,
        query: &SearchQuery,
        embedder: &dyn QueryEmbedder,
    ) -> StoreResult<SearchOutcome> {
        self.search.search(query, embedder).await
    }

    /// Collections on one backend. Never fails: an unavailable or unreachable
    /// backend yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_collections(&self, provider: Provider) -> Vec<CollectionSummary> {
        if !self.registry.is_available(provider) {
            warn!(%provider, "Provider unavailable, listing no collections");
            return Vec::new();
        }

        let listed = match self.registry.acquire(provider).await {
            Ok(adapter) => adapter.list_collections().await,
            Err(e) => Err(e),
        };

        match listed {
            Ok(collections) => collections,
            Err(e) => {
                warn!(%provider, error = %e, "Failed to list collections");
                Vec::new()
            }
        }
    }

    pub async fn describe_collection(
        &self,
        provider: Provider,
        name: &str,
    ) -> StoreResult<CollectionDescriptor> {
        let adapter = self.registry.acquire(provider).await?;
        adapter.describe_collection(name).await
    }

    #[instrument(skip(self))]
    pub async fn drop_collection(&self, provider: Provider, name: &str) -> StoreResult<bool> {
        let adapter = self.registry.acquire(provider).await?;
        let dropped = adapter.drop_collection(name).await?;
        if dropped {
            info!(%provider, collection = %name, "Dropped collection");
        } else {
            warn!(%provider, collection = %name, "Collection did not exist");
        }
        Ok(dropped)
    }
}
