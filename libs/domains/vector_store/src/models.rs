use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{StoreError, StoreResult};
use crate::payload::EmbeddingRecord;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.7;
pub const DEFAULT_WORD_COUNT_THRESHOLD: usize = 100;

// ===== Providers =====

/// Supported storage backends
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    Milvus,
    Qdrant,
    Chroma,
    Local,
}

impl Provider {
    /// Parse a provider id, case-insensitively
    pub fn parse(id: &str) -> StoreResult<Self> {
        id.trim().parse().map_err(|_| {
            let known: Vec<String> = Provider::iter().map(|p| p.to_string()).collect();
            StoreError::Validation(format!(
                "Unknown provider '{}', expected one of: {}",
                id,
                known.join(", ")
            ))
        })
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Milvus => "Milvus",
            Provider::Qdrant => "Qdrant",
            Provider::Chroma => "Chroma",
            Provider::Local => "Local (embedded)",
        }
    }

    /// Server-mode backends get a scoped connection per call
    pub fn is_server_mode(&self) -> bool {
        !matches!(self, Provider::Local)
    }
}

/// Provider entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: Provider,
    pub name: String,
    pub available: bool,
}

// ===== Collections =====

/// Similarity metric stored on a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
    Ip,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "COSINE",
            Metric::L2 => "L2",
            Metric::Ip => "IP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "COSINE" => Some(Metric::Cosine),
            "L2" | "EUCLID" | "EUCLIDEAN" => Some(Metric::L2),
            "IP" | "DOT" => Some(Metric::Ip),
            _ => None,
        }
    }
}

/// Index type plus its tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub index_type: String,
    pub params: Map<String, Value>,
}

impl IndexSpec {
    pub fn new(index_type: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            index_type: index_type.into(),
            params,
        }
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }
}

/// Backend-side materialization of a collection.
///
/// The application only ever holds the name; shape is read back from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub provider: Provider,
    pub dimension: usize,
    pub metric: Metric,
    pub index_type: String,
    pub index_params: Map<String, Value>,
}

impl CollectionDescriptor {
    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec::new(self.index_type.clone(), self.index_params.clone())
    }

    pub fn handle(&self, id: impl Into<String>) -> CollectionHandle {
        CollectionHandle {
            id: id.into(),
            name: self.name.clone(),
            dimension: self.dimension,
        }
    }
}

/// Reference to a live collection returned by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    /// Backend-native id (Chroma uses a UUID, the others reuse the name)
    pub id: String,
    pub name: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub count: u64,
}

// ===== Insertion =====

/// Document-level provenance shared by every record of a payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub embedding_provider: String,
    pub embedding_model: String,
}

/// One insertion batch. Record `i` of the batch gets id `first_id + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    pub first_id: u64,
    pub document: DocumentInfo,
    pub records: Vec<EmbeddingRecord>,
}

impl InsertBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records paired with their assigned ids
    pub fn entries(&self) -> impl Iterator<Item = (u64, &EmbeddingRecord)> {
        (self.first_id..).zip(self.records.iter())
    }
}

// ===== Search =====

/// A backend hit. `distance` is cosine distance, lower is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub distance: f32,
}

impl Neighbor {
    /// Canonical similarity in `[0, 1]`, higher is better
    pub fn similarity(&self) -> f32 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }

    /// Build a hit from a backend that natively reports cosine similarity
    pub fn from_similarity(
        id: String,
        content: String,
        metadata: Map<String, Value>,
        similarity: f32,
    ) -> Self {
        Self {
            id,
            content,
            metadata,
            distance: 1.0 - similarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub query_text: String,
    pub collection_id: String,
    pub top_k: usize,
    pub score_threshold: f32,
    pub word_count_threshold: usize,
    pub provider: Provider,
    pub save_results: bool,
}

impl SearchQuery {
    pub fn new(
        query_text: impl Into<String>,
        collection_id: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            query_text: query_text.into(),
            collection_id: collection_id.into(),
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            word_count_threshold: DEFAULT_WORD_COUNT_THRESHOLD,
            provider,
            save_results: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_word_count_threshold(mut self, threshold: usize) -> Self {
        self.word_count_threshold = threshold;
        self
    }

    pub fn with_save_results(mut self, save: bool) -> Self {
        self.save_results = save;
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.query_text.trim().is_empty() {
            return Err(StoreError::Validation("Query text is empty".to_string()));
        }
        if self.collection_id.trim().is_empty() {
            return Err(StoreError::Validation("Collection id is empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(StoreError::Validation("top_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(StoreError::Validation(format!(
                "Score threshold {} is outside [0, 1]",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub saved_filepath: Option<PathBuf>,
}

// ===== Indexing =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResult {
    pub collection_name: String,
    pub provider: Provider,
    pub index_mode: String,
    pub index_size: usize,
    pub total_vectors: usize,
    /// Wall-clock seconds
    pub processing_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("MILVUS").unwrap(), Provider::Milvus);
        assert_eq!(Provider::parse(" Qdrant ").unwrap(), Provider::Qdrant);
        assert_eq!(Provider::parse("chroma").unwrap(), Provider::Chroma);
        assert_eq!(Provider::Local.to_string(), "local");
    }

    #[test]
    fn test_provider_parse_unknown_is_validation_error() {
        let err = Provider::parse("pinecone").unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref msg) if msg.contains("pinecone")));
    }

    #[test]
    fn test_similarity_is_clamped() {
        let hit = |distance| Neighbor {
            id: "0".to_string(),
            content: String::new(),
            metadata: Map::new(),
            distance,
        };
        assert_eq!(hit(0.0).similarity(), 1.0);
        assert!((hit(0.25).similarity() - 0.75).abs() < 1e-6);
        assert_eq!(hit(1.6).similarity(), 0.0);
        assert_eq!(hit(-0.0001).similarity(), 1.0);
    }

    #[test]
    fn test_from_similarity_round_trips_score() {
        let hit = Neighbor::from_similarity("7".into(), "text".into(), Map::new(), 0.82);
        assert!((hit.similarity() - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new("what is rust", "manual", Provider::Milvus);
        assert_eq!(query.top_k, 3);
        assert_eq!(query.score_threshold, 0.7);
        assert_eq!(query.word_count_threshold, 100);
        assert!(!query.save_results);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_search_query_rejects_out_of_range_threshold() {
        let query = SearchQuery::new("q", "c", Provider::Local).with_score_threshold(1.5);
        assert!(matches!(query.validate(), Err(StoreError::Validation(_))));

        let query = SearchQuery::new("q", "c", Provider::Local).with_top_k(0);
        assert!(matches!(query.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_insert_batch_assigns_ascending_ids() {
        let batch = InsertBatch {
            first_id: 100,
            document: DocumentInfo::default(),
            records: vec![EmbeddingRecord::new(vec![1.0]), EmbeddingRecord::new(vec![2.0])],
        };
        let ids: Vec<u64> = batch.entries().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![100, 101]);
    }
}
