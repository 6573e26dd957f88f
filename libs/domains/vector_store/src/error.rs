use core_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed or inconsistent input. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Collection already exists, field types rejected, or index parameters conflict.
    #[error("Schema conflict: {0}")]
    Schema(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A batch failed mid-operation. Batches before it stay in the collection.
    #[error("Indexing into '{collection}' failed after {inserted} records: {source}")]
    Indexing {
        collection: String,
        inserted: usize,
        #[source]
        source: Box<StoreError>,
    },

    /// Connection or transport failure. Safe to retry the whole operation.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::BackendUnavailable(_) => true,
            StoreError::Indexing { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::BackendUnavailable(err.to_string())
        } else if err.is_decode() {
            StoreError::Backend(format!("Malformed backend response: {}", err))
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

// gRPC status codes surfaced by the Qdrant client
const GRPC_DEADLINE_EXCEEDED: i32 = 4;
const GRPC_NOT_FOUND: i32 = 5;
const GRPC_ALREADY_EXISTS: i32 = 6;
const GRPC_UNAVAILABLE: i32 = 14;

impl From<qdrant_client::QdrantError> for StoreError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        match &err {
            qdrant_client::QdrantError::ResponseError { status } => {
                match status.code() as i32 {
                    GRPC_UNAVAILABLE | GRPC_DEADLINE_EXCEEDED => {
                        StoreError::BackendUnavailable(status.message().to_string())
                    }
                    GRPC_NOT_FOUND => StoreError::NotFound(status.message().to_string()),
                    GRPC_ALREADY_EXISTS => StoreError::Schema(status.message().to_string()),
                    _ => StoreError::Backend(format!("Qdrant error: {}", err)),
                }
            }
            _ => StoreError::Backend(format!("Qdrant error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(format!("I/O error: {}", err))
    }
}

impl From<ConfigError> for StoreError {
    fn from(err: ConfigError) -> Self {
        StoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing_error_reports_progress_and_cause() {
        let err = StoreError::Indexing {
            collection: "manual_openai_20240101120000".to_string(),
            inserted: 100,
            source: Box::new(StoreError::BackendUnavailable("connection refused".to_string())),
        };

        let message = err.to_string();
        assert!(message.contains("manual_openai_20240101120000"));
        assert!(message.contains("100"));
        assert!(message.contains("connection refused"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        assert!(!StoreError::Validation("empty".to_string()).is_retryable());
        assert!(!StoreError::Schema("exists".to_string()).is_retryable());
    }
}
