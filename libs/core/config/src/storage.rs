use crate::{env_or_default, ConfigError, FromEnv};
use std::path::PathBuf;

const DEFAULT_STORE_DIR: &str = "03-vector-store";
const DEFAULT_RESULTS_DIR: &str = "04-search-results";

/// On-disk locations used by the embedded store and saved search results
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub store_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(store_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    /// Directory holding the embedded store's collection files
    pub fn local_store_dir(&self) -> PathBuf {
        self.store_dir.join("local_db")
    }
}

impl FromEnv for StorageConfig {
    /// Reads from environment variables with defaults:
    /// - VECTOR_STORE_DIR: defaults to "03-vector-store"
    /// - SEARCH_RESULTS_DIR: defaults to "04-search-results"
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            env_or_default("VECTOR_STORE_DIR", DEFAULT_STORE_DIR),
            env_or_default("SEARCH_RESULTS_DIR", DEFAULT_RESULTS_DIR),
        ))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_DIR, DEFAULT_RESULTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_from_env_with_defaults() {
        temp_env::with_vars(
            [
                ("VECTOR_STORE_DIR", None::<&str>),
                ("SEARCH_RESULTS_DIR", None::<&str>),
            ],
            || {
                let config = StorageConfig::from_env().unwrap();
                assert_eq!(config, StorageConfig::default());
                assert_eq!(
                    config.local_store_dir(),
                    PathBuf::from("03-vector-store").join("local_db")
                );
            },
        );
    }

    #[test]
    fn test_storage_config_from_env_with_custom_values() {
        temp_env::with_vars(
            [
                ("VECTOR_STORE_DIR", Some("/data/vectors")),
                ("SEARCH_RESULTS_DIR", Some("/data/results")),
            ],
            || {
                let config = StorageConfig::from_env().unwrap();
                assert_eq!(config.store_dir, PathBuf::from("/data/vectors"));
                assert_eq!(config.results_dir, PathBuf::from("/data/results"));
            },
        );
    }
}
