//! Vector Store Domain Library
//!
//! Indexes pre-computed document embeddings into interchangeable vector backends
//! and answers thresholded top-k similarity queries against them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  VectorStoreService  │  ← Facade used by applications
//! └──────┬────────┬──────┘
//!        │        │
//! ┌──────▼──────┐ ┌▼─────────────┐     ┌───────────────┐
//! │IndexingEngine│ │ SearchEngine │────▶│ QueryEmbedder │
//! └──────┬──────┘ └┬─────────────┘     │ ResultSink    │
//!        │         │                   │   (traits)    │
//! ┌──────▼─────────▼──────┐            └───────────────┘
//! │   ProviderRegistry    │  ← Shared or per-call (scoped) adapters
//! └──────────┬────────────┘
//!            │
//! ┌──────────▼────────────┐
//! │   ProviderAdapter     │
//! │       (trait)         │
//! └──────────┬────────────┘
//!            │
//!   Milvus · Qdrant · Chroma · Local
//! ```
//!
//! # Conventions
//!
//! - Every collection uses cosine similarity.
//! - Adapters return cosine *distance* (lower is better); results carry
//!   similarity `clamp(1 - distance, 0, 1)`.
//! - Collection names come from [`naming::collection_name`] and are legal on
//!   every backend.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_vector_store::{Provider, ProviderRegistry, SearchQuery, VectorStoreService};
//! use domain_vector_store::embedding::{OpenAiConfig, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
//! use core_config::FromEnv;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ProviderRegistry::from_env("03-vector-store/local_db")?;
//! let service = VectorStoreService::new(registry);
//!
//! let indexed = service
//!     .index_file("02-embedded-docs/manual.json", Provider::Local, "hnsw")
//!     .await?;
//!
//! let embedder = OpenAiEmbedder::new(OpenAiConfig::from_env()?, DEFAULT_EMBEDDING_MODEL);
//! let query = SearchQuery::new("how do I reset the device", indexed.collection_name, Provider::Local)
//!     .with_top_k(5)
//!     .with_score_threshold(0.5);
//! let outcome = service.search(&query, &embedder).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod chroma;
pub mod embedding;
pub mod error;
pub mod index_modes;
pub mod indexing;
pub mod local;
pub mod milvus;
pub mod models;
pub mod naming;
pub mod payload;
pub mod qdrant;
pub mod registry;
pub mod schema;
pub mod search;
pub mod service;

// Re-export commonly used types
pub use adapter::{Connector, ProviderAdapter};
pub use embedding::QueryEmbedder;
pub use error::{StoreError, StoreResult};
pub use indexing::{BATCH_SIZE, IndexingEngine};
pub use local::LocalStore;
pub use models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexResult, IndexSpec, Metric,
    Neighbor, Provider, ProviderInfo, SearchOutcome, SearchQuery, SearchResult,
};
pub use payload::{EmbeddingPayload, EmbeddingRecord, load_payload};
pub use registry::{Lease, ProviderRegistry};
pub use search::{ResultSink, SearchEngine, SearchRecord};
pub use service::VectorStoreService;
