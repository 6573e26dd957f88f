use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexSpec, InsertBatch, Metric,
    Neighbor, Provider,
};

/// Capability set every storage backend implements.
///
/// Distances returned by `search` are cosine distances: ascending, best match first.
/// Backends that natively report similarity convert at this boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether this backend can run on the current host
    fn is_available(&self) -> bool;

    // ===== Collection lifecycle =====

    /// Fails with `StoreError::Schema` if the name is taken or the field types are rejected
    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> StoreResult<CollectionHandle>;

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionDescriptor>;

    async fn list_collections(&self) -> StoreResult<Vec<CollectionSummary>>;

    async fn drop_collection(&self, name: &str) -> StoreResult<bool>;

    // ===== Data =====

    /// Insert one batch, returning how many records the backend accepted
    async fn insert_batch(&self, handle: &CollectionHandle, batch: InsertBatch)
    -> StoreResult<usize>;

    /// Build or activate the similarity index.
    ///
    /// Idempotent for identical parameters, `StoreError::Schema` otherwise.
    async fn build_index(
        &self,
        handle: &CollectionHandle,
        index: &IndexSpec,
        metric: Metric,
    ) -> StoreResult<()>;

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<Neighbor>>;
}

/// Opens a scoped connection to a server-mode backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    fn provider(&self) -> Provider;

    fn is_available(&self) -> bool;

    async fn connect(&self) -> StoreResult<Box<dyn ProviderAdapter>>;
}
