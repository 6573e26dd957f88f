//! Shared test utilities for the vector store crates
//!
//! This crate provides reusable test infrastructure:
//! - `PayloadBuilder`: Deterministic embedding exports (always available)
//! - `assertions`: Search result assertion helpers (always available)
//! - `TestQdrant`: Qdrant container with automatic cleanup (feature: "qdrant")
//!
//! Exports are produced as raw JSON in the ingestion format, so they go
//! through the same parsing path as files on disk.
//!
//! # Usage
//!
//! ```rust
//! use test_utils::PayloadBuilder;
//!
//! let export = PayloadBuilder::from_test_name("test_search_ranking")
//!     .filename("manual.pdf")
//!     .dimension(8)
//!     .random_records(20)
//!     .build();
//! assert_eq!(export["embeddings"].as_array().unwrap().len(), 20);
//! ```

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

#[cfg(feature = "qdrant")]
mod qdrant;

#[cfg(feature = "qdrant")]
pub use qdrant::TestQdrant;

/// Builder for embedding exports with deterministic randomization
///
/// The same seed always yields the same vectors.
pub struct PayloadBuilder {
    seed: u64,
    filename: String,
    embedding_provider: String,
    embedding_model: String,
    dimension: usize,
    records: Vec<(Vec<f32>, String)>,
}

impl PayloadBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            filename: "document.pdf".to_string(),
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            dimension: 3,
            records: Vec::new(),
        }
    }

    /// Create from test name (generates seed from test name hash)
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn embedding_provider(mut self, provider: &str) -> Self {
        self.embedding_provider = provider.to_string();
        self
    }

    /// Vector dimension of records added afterwards by `random_records`
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Add one record with an explicit vector
    pub fn record(mut self, vector: &[f32], content: &str) -> Self {
        self.records.push((vector.to_vec(), content.to_string()));
        self
    }

    /// Add `count` unit-length pseudo-random records
    pub fn random_records(mut self, count: usize) -> Self {
        let mut state = self.seed;
        for _ in 0..count {
            let index = self.records.len();
            let vector = unit_vector(&mut state, self.dimension);
            self.records
                .push((vector, format!("passage {} of the test document", index)));
        }
        self
    }

    /// Vector of the `index`-th record added so far
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        self.records.get(index).map(|(vector, _)| vector.as_slice())
    }

    pub fn build(&self) -> Value {
        let total = self.records.len();
        let embeddings: Vec<Value> = self
            .records
            .iter()
            .enumerate()
            .map(|(chunk_id, (vector, content))| {
                json!({
                    "embedding": vector,
                    "metadata": {
                        "content": content,
                        "chunk_id": chunk_id + 1,
                        "total_chunks": total,
                        "word_count": content.split_whitespace().count(),
                        "page_number": "1",
                        "page_range": "1",
                        "embedding_timestamp": "2024-05-01T12:30:45",
                    }
                })
            })
            .collect();

        json!({
            "filename": self.filename,
            "embedding_provider": self.embedding_provider,
            "embedding_model": self.embedding_model,
            "vector_dimension": self.records.first().map_or(self.dimension, |(v, _)| v.len()),
            "embeddings": embeddings,
        })
    }

    /// Write the export as `<stem>.json` under `dir`
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let stem = Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let path = dir.join(format!("{}.json", stem));
        std::fs::write(&path, self.build().to_string()).expect("Failed to write test export");
        path
    }
}

/// Splitmix64 step
fn next_u64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn unit_vector(state: &mut u64, dimension: usize) -> Vec<f32> {
    let raw: Vec<f32> = (0..dimension)
        .map(|_| (next_u64(state) >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0)
        .collect();
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return raw;
    }
    raw.into_iter().map(|x| x / norm).collect()
}

/// Scratch directory removed on drop
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Search result assertion helpers
pub mod assertions {
    /// Assert scores never increase from one result to the next
    pub fn assert_non_increasing(scores: &[f32], context: &str) {
        for pair in scores.windows(2) {
            assert!(
                pair[0] >= pair[1],
                "{}: scores not ranked, {} before {} in {:?}",
                context,
                pair[0],
                pair[1],
                scores
            );
        }
    }

    /// Assert every score lies in `[threshold, 1]`
    pub fn assert_scores_within(scores: &[f32], threshold: f32, context: &str) {
        for score in scores {
            assert!(
                (threshold..=1.0).contains(score),
                "{}: score {} outside [{}, 1]",
                context,
                score,
                threshold
            );
        }
    }

    /// Assert a collection name is legal on every backend
    pub fn assert_legal_name(name: &str) {
        assert!(
            (1..=63).contains(&name.len()),
            "name '{}' has length {}",
            name,
            name.len()
        );
        assert!(
            name.starts_with(|c: char| c.is_ascii_alphabetic()),
            "name '{}' does not start with a letter",
            name
        );
        assert!(
            name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "name '{}' has illegal characters",
            name
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
