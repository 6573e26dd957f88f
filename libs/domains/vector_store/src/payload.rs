//! Embedding export ingestion.
//!
//! Exports are loosely typed JSON: vectors may arrive as numeric arrays, as a JSON
//! array encoded in a string, or as whitespace-separated numbers. Everything is
//! normalized here so the engines only ever see a validated [`EmbeddingPayload`].

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::models::DocumentInfo;

const DEFAULT_EMBEDDING_PROVIDER: &str = "unknown";
const DEFAULT_PAGE_NUMBER: &str = "0";

/// One chunk's vector plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    pub vector: Vec<f32>,
    pub content: String,
    pub chunk_id: i64,
    pub total_chunks: i64,
    pub word_count: i64,
    pub page_number: String,
    pub page_range: String,
    pub embedding_timestamp: String,
}

impl EmbeddingRecord {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            content: String::new(),
            chunk_id: 0,
            total_chunks: 0,
            word_count: 0,
            page_number: DEFAULT_PAGE_NUMBER.to_string(),
            page_range: String::new(),
            embedding_timestamp: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// The unit of ingestion. Consumed once by the indexing engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingPayload {
    pub filename: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub vector_dimension: usize,
    pub records: Vec<EmbeddingRecord>,
}

impl EmbeddingPayload {
    /// Normalize a raw export into a validated payload
    pub fn from_value(value: Value) -> StoreResult<Self> {
        let Value::Object(mut root) = value else {
            return Err(invalid("Embedding export must be a JSON object"));
        };

        let entries = match root.remove("embeddings") {
            Some(Value::Array(entries)) if !entries.is_empty() => entries,
            Some(Value::Array(_)) => return Err(invalid("'embeddings' is empty")),
            Some(Value::Null) | None => return Err(invalid("Missing 'embeddings' key")),
            Some(_) => return Err(invalid("'embeddings' must be an array")),
        };

        let vector_dimension = parse_dimension(root.get("vector_dimension"))?;

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| parse_record(index, entry))
            .collect::<StoreResult<Vec<_>>>()?;

        let payload = Self {
            filename: text_value(root.get("filename")).unwrap_or_default(),
            embedding_provider: text_value(root.get("embedding_provider"))
                .unwrap_or_else(|| DEFAULT_EMBEDDING_PROVIDER.to_string()),
            embedding_model: text_value(root.get("embedding_model")).unwrap_or_default(),
            vector_dimension,
            records,
        };
        payload.validate()?;

        Ok(payload)
    }

    pub fn from_json_str(raw: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| invalid(format!("Embedding export is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Check the payload invariants: positive dimension, at least one record,
    /// and every vector exactly `vector_dimension` long.
    pub fn validate(&self) -> StoreResult<()> {
        if self.vector_dimension == 0 {
            return Err(invalid("'vector_dimension' must be positive"));
        }
        if self.records.is_empty() {
            return Err(invalid("Payload has no records"));
        }
        if let Some((index, record)) = self
            .records
            .iter()
            .enumerate()
            .find(|(_, record)| record.vector.len() != self.vector_dimension)
        {
            return Err(invalid(format!(
                "Record {} has {} dimensions, expected {}",
                index,
                record.vector.len(),
                self.vector_dimension
            )));
        }
        Ok(())
    }

    pub fn document_info(&self) -> DocumentInfo {
        DocumentInfo {
            filename: self.filename.clone(),
            embedding_provider: self.embedding_provider.clone(),
            embedding_model: self.embedding_model.clone(),
        }
    }
}

/// Read and normalize an export file
pub fn load_payload(path: impl AsRef<Path>) -> StoreResult<EmbeddingPayload> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StoreError::Validation(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    EmbeddingPayload::from_json_str(&raw)
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Validation(message.into())
}

fn parse_dimension(raw: Option<&Value>) -> StoreResult<usize> {
    let dimension = match raw {
        None | Some(Value::Null) => return Err(invalid("Missing 'vector_dimension'")),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match dimension {
        Some(d) if d > 0 => Ok(d as usize),
        Some(d) => Err(invalid(format!("'vector_dimension' must be positive, got {}", d))),
        None => Err(invalid("'vector_dimension' must be an integer")),
    }
}

fn parse_record(index: usize, entry: Value) -> StoreResult<EmbeddingRecord> {
    let Value::Object(mut entry) = entry else {
        return Err(invalid(format!("Embedding entry {} is not an object", index)));
    };

    let vector = match entry.remove("embedding") {
        Some(raw) => parse_vector(raw)
            .map_err(|reason| invalid(format!("Embedding entry {}: {}", index, reason)))?,
        None => return Err(invalid(format!("Embedding entry {} has no 'embedding'", index))),
    };

    let metadata = match entry.remove("metadata") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(EmbeddingRecord {
        vector,
        content: text_value(metadata.get("content")).unwrap_or_default(),
        chunk_id: int_field(&metadata, "chunk_id", index)?,
        total_chunks: int_field(&metadata, "total_chunks", index)?,
        word_count: int_field(&metadata, "word_count", index)?,
        page_number: text_value(metadata.get("page_number"))
            .unwrap_or_else(|| DEFAULT_PAGE_NUMBER.to_string()),
        page_range: text_value(metadata.get("page_range")).unwrap_or_default(),
        embedding_timestamp: text_value(metadata.get("embedding_timestamp")).unwrap_or_default(),
    })
}

fn parse_vector(raw: Value) -> Result<Vec<f32>, String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => n.as_f64().map(|f| f as f32),
                Value::String(s) => s.trim().parse::<f32>().ok(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| "vector contains a non-numeric element".to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<f32>>(trimmed)
                    .map_err(|e| format!("vector string is not a numeric array: {}", e))
            } else {
                trimmed
                    .split_whitespace()
                    .map(|token| token.parse::<f32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| format!("vector string is not numeric: {}", e))
            }
        }
        _ => Err("vector must be a numeric array or a numeric string".to_string()),
    }
}

fn text_value(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn int_field(metadata: &Map<String, Value>, key: &str, index: usize) -> StoreResult<i64> {
    let parsed = match metadata.get(key) {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    parsed.ok_or_else(|| {
        invalid(format!(
            "Embedding entry {}: metadata '{}' is not an integer",
            index, key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export(embeddings: Value) -> Value {
        json!({
            "filename": "manual.pdf",
            "embedding_provider": "openai",
            "embedding_model": "text-embedding-3-small",
            "vector_dimension": 3,
            "embeddings": embeddings,
        })
    }

    #[test]
    fn test_parses_numeric_array_with_metadata() {
        let payload = EmbeddingPayload::from_value(export(json!([{
            "embedding": [1.0, 0.0, 0.5],
            "metadata": {
                "content": "Install the unit upright.",
                "chunk_id": 1,
                "total_chunks": 4,
                "word_count": 4,
                "page_number": 2,
                "page_range": "2-3",
                "embedding_timestamp": "2024-05-01T10:00:00"
            }
        }])))
        .unwrap();

        assert_eq!(payload.filename, "manual.pdf");
        assert_eq!(payload.vector_dimension, 3);
        let record = &payload.records[0];
        assert_eq!(record.vector, vec![1.0, 0.0, 0.5]);
        assert_eq!(record.chunk_id, 1);
        assert_eq!(record.page_number, "2");
        assert_eq!(record.page_range, "2-3");
    }

    #[test]
    fn test_parses_string_encoded_vectors() {
        let payload = EmbeddingPayload::from_value(export(json!([
            { "embedding": "[0.1, 0.2, 0.3]" },
            { "embedding": "0.4 0.5\t0.6" }
        ])))
        .unwrap();

        assert_eq!(payload.records[0].vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(payload.records[1].vector, vec![0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_metadata_defaults() {
        let payload =
            EmbeddingPayload::from_value(export(json!([{ "embedding": [1, 2, 3] }]))).unwrap();
        let record = &payload.records[0];
        assert_eq!(record.content, "");
        assert_eq!(record.word_count, 0);
        assert_eq!(record.page_number, "0");
        assert_eq!(record.embedding_timestamp, "");
    }

    #[test]
    fn test_top_level_defaults() {
        let payload = EmbeddingPayload::from_value(json!({
            "vector_dimension": 1,
            "embeddings": [{ "embedding": [1.0] }]
        }))
        .unwrap();
        assert_eq!(payload.filename, "");
        assert_eq!(payload.embedding_provider, "unknown");
        assert_eq!(payload.embedding_model, "");
    }

    #[test]
    fn test_missing_or_empty_embeddings_is_rejected() {
        let missing = json!({ "vector_dimension": 3 });
        assert!(matches!(
            EmbeddingPayload::from_value(missing),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            EmbeddingPayload::from_value(export(json!([]))),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_dimension_is_rejected() {
        for dimension in [json!(0), json!(-4), json!("wide"), Value::Null] {
            let raw = json!({
                "vector_dimension": dimension,
                "embeddings": [{ "embedding": [1.0] }]
            });
            assert!(matches!(
                EmbeddingPayload::from_value(raw),
                Err(StoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_dimension_mismatch_names_the_record() {
        let err = EmbeddingPayload::from_value(export(json!([
            { "embedding": [1, 0, 0] },
            { "embedding": [1, 0] }
        ])))
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref msg) if msg.contains("Record 1")));
    }

    #[test]
    fn test_non_numeric_embedding_is_rejected() {
        for embedding in [json!("a b c"), json!({"x": 1}), json!([1, "two", 3])] {
            let err = EmbeddingPayload::from_value(export(json!([{ "embedding": embedding }])))
                .unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
    }

    #[test]
    fn test_load_payload_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual_embeddings.json");
        std::fs::write(
            &path,
            export(json!([{ "embedding": [0.0, 1.0, 0.0] }])).to_string(),
        )
        .unwrap();

        let payload = load_payload(&path).unwrap();
        assert_eq!(payload.records.len(), 1);

        let missing = load_payload(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(StoreError::Validation(_))));
    }
}
