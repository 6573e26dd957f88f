//! Saved search results on disk

use std::fs;
use std::path::{Path, PathBuf};

use domain_vector_store::{ResultSink, SearchRecord, StoreError, StoreResult};

/// Writes each search as `search_{collection}_{YYYYmmddHHMMSS}.json`
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(record: &SearchRecord) -> String {
        let collection = Path::new(&record.collection_id)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("collection");
        format!(
            "search_{}_{}.json",
            collection,
            record.timestamp.format("%Y%m%d%H%M%S")
        )
    }
}

impl ResultSink for JsonFileSink {
    fn save(&self, record: &SearchRecord) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(Self::file_name(record));
        let body = serde_json::to_string_pretty(record)?;
        fs::write(&path, body).map_err(|e| {
            StoreError::Backend(format!("Cannot write '{}': {}", path.display(), e))
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use domain_vector_store::SearchResult;
    use serde_json::{Map, Value};

    fn record(collection_id: &str) -> SearchRecord {
        SearchRecord {
            query: "how do I reset".to_string(),
            collection_id: collection_id.to_string(),
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap(),
            results: vec![SearchResult {
                content: "Hold the power button".to_string(),
                score: 0.93,
                metadata: Map::new(),
            }],
        }
    }

    #[test]
    fn test_file_name_uses_collection_basename() {
        assert_eq!(
            JsonFileSink::file_name(&record("store/manual_openai_20240501123045")),
            "search_manual_openai_20240501123045_20240501123045.json"
        );
    }

    #[test]
    fn test_save_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("results"));

        let path = sink.save(&record("manual_openai_20240501123045")).unwrap();

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["query"], "how do I reset");
        assert_eq!(saved["collection_id"], "manual_openai_20240501123045");
        assert_eq!(saved["results"][0]["content"], "Hold the power button");
        assert!(saved["timestamp"].as_str().unwrap().starts_with("2024-05-01T12:30:45"));
    }
}
