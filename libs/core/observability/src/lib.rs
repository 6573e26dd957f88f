//! Observability utilities for the vector store.
//!
//! This crate provides:
//! - Prometheus recorder installation and rendering
//! - Vector store metrics (indexing, search, backend operations)
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, VectorStoreMetrics};
//!
//! let handle = init_metrics()?;
//! VectorStoreMetrics::record_batch("milvus", 100);
//! println!("{}", handle.render());
//! ```

pub mod vector_store;

pub use vector_store::{OperationTimer, VectorStoreMetrics};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the current metrics in Prometheus text format
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_histogram;

    describe_counter!(
        "vector_store_operations_total",
        "Backend operations by provider, operation and status"
    );
    describe_histogram!(
        "vector_store_operation_duration_seconds",
        "Backend operation duration in seconds"
    );
    describe_counter!(
        "vector_store_vectors_indexed_total",
        "Vectors written to a backend"
    );
    describe_counter!(
        "vector_store_batches_total",
        "Insertion batches accepted by a backend"
    );
    describe_counter!(
        "vector_store_indexing_total",
        "Indexing operations by provider and status"
    );
    describe_histogram!(
        "vector_store_indexing_duration_seconds",
        "End-to-end indexing duration in seconds"
    );
    describe_counter!(
        "vector_store_search_filtered_total",
        "Search hits dropped by the score or word-count threshold"
    );
    describe_counter!(
        "vector_store_searches_total",
        "Semantic searches by provider"
    );
    describe_histogram!(
        "vector_store_search_results",
        "Results returned per search after filtering"
    );
}
