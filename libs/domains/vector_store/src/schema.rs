//! Static collection schema shared by every backend.

use serde_json::{Map, Value};

use crate::models::DocumentInfo;
use crate::payload::EmbeddingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int64,
    VarChar,
    FloatVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub max_length: Option<usize>,
    pub primary: bool,
}

impl FieldSpec {
    const fn int64(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Int64,
            max_length: None,
            primary: false,
        }
    }

    const fn varchar(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::VarChar,
            max_length: Some(max_length),
            primary: false,
        }
    }
}

pub const ID_FIELD: &str = "id";
pub const CONTENT_FIELD: &str = "content";
pub const VECTOR_FIELD: &str = "vector";

pub const COLLECTION_FIELDS: [FieldSpec; 12] = [
    FieldSpec {
        name: ID_FIELD,
        kind: FieldKind::Int64,
        max_length: None,
        primary: true,
    },
    FieldSpec::varchar(CONTENT_FIELD, 5000),
    FieldSpec::varchar("document_name", 255),
    FieldSpec::int64("chunk_id"),
    FieldSpec::int64("total_chunks"),
    FieldSpec::int64("word_count"),
    FieldSpec::varchar("page_number", 10),
    FieldSpec::varchar("page_range", 10),
    FieldSpec::varchar("embedding_provider", 50),
    FieldSpec::varchar("embedding_model", 50),
    FieldSpec::varchar("embedding_timestamp", 50),
    FieldSpec {
        name: VECTOR_FIELD,
        kind: FieldKind::FloatVector,
        max_length: None,
        primary: false,
    },
];

const fn count_fields(primary: bool, vector: bool) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < COLLECTION_FIELDS.len() {
        let field = &COLLECTION_FIELDS[i];
        if (primary && field.primary)
            || (vector && matches!(field.kind, FieldKind::FloatVector))
        {
            count += 1;
        }
        i += 1;
    }
    count
}

const _: () = assert!(count_fields(true, false) == 1, "exactly one primary key");
const _: () = assert!(count_fields(false, true) == 1, "exactly one vector field");

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    COLLECTION_FIELDS.iter().find(|f| f.name == name)
}

/// Scalar fields stored alongside the vector, excluding the primary key
pub fn metadata_fields() -> impl Iterator<Item = &'static FieldSpec> {
    COLLECTION_FIELDS
        .iter()
        .filter(|f| !f.primary && f.kind != FieldKind::FloatVector)
}

/// Truncate to the field's max length in UTF-8 bytes, on a char boundary
pub fn fit(field_name: &str, value: &str) -> String {
    match field(field_name).and_then(|f| f.max_length) {
        Some(max) if value.len() > max => {
            let end = value
                .char_indices()
                .map(|(idx, ch)| idx + ch.len_utf8())
                .take_while(|&end| end <= max)
                .last()
                .unwrap_or(0);
            value[..end].to_string()
        }
        _ => value.to_string(),
    }
}

/// Scalar column values for one record, already fitted to the schema
pub fn record_fields(document: &DocumentInfo, record: &EmbeddingRecord) -> Map<String, Value> {
    let mut map = Map::new();
    for spec in metadata_fields() {
        let value = match spec.name {
            CONTENT_FIELD => Value::from(fit(spec.name, &record.content)),
            "document_name" => Value::from(fit(spec.name, &document.filename)),
            "chunk_id" => Value::from(record.chunk_id),
            "total_chunks" => Value::from(record.total_chunks),
            "word_count" => Value::from(record.word_count),
            "page_number" => Value::from(fit(spec.name, &record.page_number)),
            "page_range" => Value::from(fit(spec.name, &record.page_range)),
            "embedding_provider" => Value::from(fit(spec.name, &document.embedding_provider)),
            "embedding_model" => Value::from(fit(spec.name, &document.embedding_model)),
            "embedding_timestamp" => Value::from(fit(spec.name, &record.embedding_timestamp)),
            _ => continue,
        };
        map.insert(spec.name.to_string(), value);
    }
    map
}

/// Split a stored row into its content and remaining metadata
pub fn split_content(mut fields: Map<String, Value>) -> (String, Map<String, Value>) {
    let content = match fields.remove(CONTENT_FIELD) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    fields.remove(VECTOR_FIELD);
    (content, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_shape() {
        assert_eq!(field(ID_FIELD).map(|f| f.primary), Some(true));
        assert_eq!(field("content").and_then(|f| f.max_length), Some(5000));
        assert_eq!(field("page_range").and_then(|f| f.max_length), Some(10));
        assert_eq!(metadata_fields().count(), 10);
    }

    #[test]
    fn test_fit_truncates_on_char_boundary() {
        let long = "页".repeat(12);
        let fitted = fit("page_number", &long);
        assert_eq!(fitted, "页".repeat(3));
        assert_eq!(fit("page_number", "12"), "12");
        assert_eq!(fit("page_range", "12-1234567"), "12-1234567");
    }

    #[test]
    fn test_fit_bounds_multibyte_content_in_bytes() {
        let chunk = "页".repeat(5000);
        let fitted = fit(CONTENT_FIELD, &chunk);
        assert!(fitted.len() <= 5000);
        assert_eq!(fitted.chars().count(), 1666);
        assert!(fitted.chars().all(|c| c == '页'));

        // Mixed widths stop before the first char that would cross the limit
        let mixed = format!("p{}", "页".repeat(4));
        assert_eq!(fit("page_range", &mixed), format!("p{}", "页".repeat(3)));
    }

    #[test]
    fn test_record_fields_fit_cjk_values() {
        let document = DocumentInfo {
            filename: format!("{}.pdf", "黑神话".repeat(40)),
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        };
        let record = EmbeddingRecord::new(vec![0.0; 3]).with_content("页".repeat(6000));

        let fields = record_fields(&document, &record);
        for spec in metadata_fields() {
            if let (Some(max), Some(text)) = (spec.max_length, fields[spec.name].as_str()) {
                assert!(text.len() <= max, "{} is {} bytes", spec.name, text.len());
            }
        }
    }

    #[test]
    fn test_record_fields_carry_document_info() {
        let document = DocumentInfo {
            filename: "manual.pdf".to_string(),
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        };
        let record = EmbeddingRecord::new(vec![0.0; 3]).with_content("Hold the button.");

        let fields = record_fields(&document, &record);
        assert_eq!(fields["document_name"], "manual.pdf");
        assert_eq!(fields["content"], "Hold the button.");
        assert_eq!(fields["page_number"], "0");
        assert!(!fields.contains_key(ID_FIELD));
        assert!(!fields.contains_key(VECTOR_FIELD));

        let (content, metadata) = split_content(fields);
        assert_eq!(content, "Hold the button.");
        assert_eq!(metadata.len(), 9);
    }
}
