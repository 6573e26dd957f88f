//! Vector store metrics.

use metrics::{counter, histogram};
use std::time::Instant;

/// Vector store metrics recorder
pub struct VectorStoreMetrics;

impl VectorStoreMetrics {
    /// Record a finished backend operation
    pub fn record_operation(provider: &str, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "ok" } else { "error" };
        counter!(
            "vector_store_operations_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!(
            "vector_store_operation_duration_seconds",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(duration_secs);
    }

    /// Record one accepted insertion batch
    pub fn record_batch(provider: &str, size: usize) {
        counter!("vector_store_batches_total", "provider" => provider.to_string()).increment(1);
        counter!("vector_store_vectors_indexed_total", "provider" => provider.to_string())
            .increment(size as u64);
    }

    /// Record a finished indexing operation
    pub fn record_indexing(provider: &str, success: bool, total_vectors: usize, duration_secs: f64) {
        let status = if success { "ok" } else { "error" };
        counter!(
            "vector_store_indexing_total",
            "provider" => provider.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!("vector_store_indexing_duration_seconds", "provider" => provider.to_string())
            .record(duration_secs);

        tracing::debug!(
            provider = provider,
            success = success,
            total_vectors = total_vectors,
            duration_secs = duration_secs,
            "Indexing recorded"
        );
    }

    /// Record a search: hits returned to the caller and hits dropped by the filters
    pub fn record_search(provider: &str, returned: usize, filtered: usize) {
        counter!("vector_store_searches_total", "provider" => provider.to_string()).increment(1);
        histogram!("vector_store_search_results", "provider" => provider.to_string())
            .record(returned as f64);
        counter!("vector_store_search_filtered_total", "provider" => provider.to_string())
            .increment(filtered as u64);

        tracing::debug!(
            provider = provider,
            returned = returned,
            filtered = filtered,
            "Search recorded"
        );
    }
}

/// Timer guard for a backend operation.
///
/// Records as a failure when dropped without `succeed()`.
pub struct OperationTimer {
    start: Instant,
    provider: String,
    operation: &'static str,
    finished: bool,
}

impl OperationTimer {
    pub fn start(provider: &str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            provider: provider.to_string(),
            operation,
            finished: false,
        }
    }

    /// Record the operation as successful. Returns elapsed milliseconds.
    pub fn succeed(mut self) -> u64 {
        self.finish(true)
    }

    fn finish(&mut self, success: bool) -> u64 {
        if self.finished {
            return 0;
        }
        self.finished = true;

        let elapsed = self.start.elapsed();
        VectorStoreMetrics::record_operation(
            &self.provider,
            self.operation,
            success,
            elapsed.as_secs_f64(),
        );
        elapsed.as_millis() as u64
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_once() {
        let mut timer = OperationTimer::start("local", "search");
        timer.finish(true);
        assert_eq!(timer.finish(true), 0);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        VectorStoreMetrics::record_batch("milvus", 100);
        VectorStoreMetrics::record_indexing("milvus", true, 101, 0.4);
        VectorStoreMetrics::record_search("qdrant", 3, 2);
        let timer = OperationTimer::start("chroma", "insert_batch");
        drop(timer);
    }
}
