use std::sync::Arc;
use std::time::Instant;

use observability::VectorStoreMetrics;
use tracing::{error, info, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::index_modes;
use crate::models::{CollectionDescriptor, IndexResult, InsertBatch, Metric, Provider};
use crate::naming;
use crate::payload::EmbeddingPayload;
use crate::registry::ProviderRegistry;

/// Records per insertion batch
pub const BATCH_SIZE: usize = 100;

/// Drives a payload into a freshly created collection
pub struct IndexingEngine {
    registry: Arc<ProviderRegistry>,
    batch_size: usize,
}

impl IndexingEngine {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Create a collection for `payload`, insert every record and build the index.
    ///
    /// Modes the provider cannot build are mapped to its nearest native index,
    /// which is what the descriptor records.
    ///
    /// Record `i` of the payload is stored under id `i`. A failed batch aborts the
    /// operation with `StoreError::Indexing`; batches already accepted stay in the
    /// collection.
    #[instrument(
        skip(self, payload),
        fields(provider = %provider, filename = %payload.filename, records = payload.records.len())
    )]
    pub async fn index_payload(
        &self,
        payload: EmbeddingPayload,
        provider: Provider,
        index_mode: &str,
    ) -> StoreResult<IndexResult> {
        let started = Instant::now();
        payload.validate()?;

        let collection_name = naming::collection_name(
            &payload.filename,
            &payload.embedding_provider,
            chrono::Local::now().naive_local(),
        );
        let requested = index_modes::resolve(index_mode);
        let index = index_modes::native_index(provider, &requested);
        if index != requested {
            warn!(
                %provider,
                requested = %requested.index_type,
                effective = %index.index_type,
                "Index type not available on provider, using nearest native index"
            );
        }
        let descriptor = CollectionDescriptor {
            name: collection_name.clone(),
            provider,
            dimension: payload.vector_dimension,
            metric: Metric::Cosine,
            index_type: index.index_type.clone(),
            index_params: index.params.clone(),
        };
        let total_vectors = payload.records.len();

        let result = self.run(payload, descriptor).await;
        let elapsed = started.elapsed().as_secs_f64();
        VectorStoreMetrics::record_indexing(provider.as_ref(), result.is_ok(), total_vectors, elapsed);

        let inserted = result?;
        info!(
            collection = %collection_name,
            index_type = %index.index_type,
            inserted,
            elapsed_secs = elapsed,
            "Indexed payload"
        );

        Ok(IndexResult {
            collection_name,
            provider,
            index_mode: index_mode.to_string(),
            index_size: inserted,
            total_vectors,
            processing_time: elapsed,
        })
    }

    async fn run(&self, payload: EmbeddingPayload, descriptor: CollectionDescriptor) -> StoreResult<usize> {
        let provider = descriptor.provider;
        let adapter = self.registry.acquire(provider).await?;

        let handle = adapter.create_collection(&descriptor).await.inspect_err(|e| {
            error!(
                %provider,
                collection = %descriptor.name,
                dimension = descriptor.dimension,
                error = %e,
                "Failed to create collection"
            );
        })?;

        let document = payload.document_info();
        let mut records = payload.records;
        let mut inserted = 0usize;
        let mut next_id = 0u64;

        while !records.is_empty() {
            let rest = records.split_off(records.len().min(self.batch_size));
            let batch = InsertBatch {
                first_id: next_id,
                document: document.clone(),
                records: std::mem::replace(&mut records, rest),
            };
            let size = batch.len();

            let outcome = match adapter.insert_batch(&handle, batch).await {
                Ok(count) if count == size => Ok(count),
                Ok(count) => Err(StoreError::Backend(format!(
                    "Backend accepted {} of {} records",
                    count, size
                ))),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(count) => {
                    inserted += count;
                    next_id += count as u64;
                    VectorStoreMetrics::record_batch(provider.as_ref(), count);
                }
                Err(e) => {
                    error!(
                        %provider,
                        collection = %handle.name,
                        first_id = next_id,
                        batch_size = size,
                        inserted,
                        error = %e,
                        "Batch insertion failed"
                    );
                    return Err(StoreError::Indexing {
                        collection: handle.name.clone(),
                        inserted,
                        source: Box::new(e),
                    });
                }
            }
        }

        adapter
            .build_index(&handle, &descriptor.index_spec(), descriptor.metric)
            .await
            .inspect_err(|e| {
                error!(
                    %provider,
                    collection = %handle.name,
                    index_type = %descriptor.index_type,
                    inserted,
                    error = %e,
                    "Failed to build index"
                );
            })?;

        Ok(inserted)
    }
}
