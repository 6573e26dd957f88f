//! Configuration for the vector CLI

use core_config::{ConfigError, FromEnv, env_optional, env_parse_or, storage::StorageConfig};
use domain_vector_store::BATCH_SIZE;
use domain_vector_store::embedding::DEFAULT_EMBEDDING_MODEL;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub storage: StorageConfig,
    /// Model used to embed search queries; must match the indexed exports
    pub embedding_model: String,
    pub batch_size: usize,
}

impl FromEnv for Config {
    /// Reads from environment variables with defaults:
    /// - VECTOR_STORE_DIR / SEARCH_RESULTS_DIR: see `StorageConfig`
    /// - EMBEDDING_MODEL: defaults to "text-embedding-3-small"
    /// - INDEX_BATCH_SIZE: defaults to 100
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            storage: StorageConfig::from_env()?,
            embedding_model: env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            batch_size: env_parse_or("INDEX_BATCH_SIZE", BATCH_SIZE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        temp_env::with_vars(
            [
                ("EMBEDDING_MODEL", None::<&str>),
                ("INDEX_BATCH_SIZE", None),
                ("VECTOR_STORE_DIR", None),
                ("SEARCH_RESULTS_DIR", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.embedding_model, "text-embedding-3-small");
                assert_eq!(config.batch_size, 100);
                assert_eq!(config.storage, StorageConfig::default());
            },
        );
    }

    #[test]
    fn test_invalid_batch_size() {
        temp_env::with_var("INDEX_BATCH_SIZE", Some("lots"), || {
            assert!(matches!(
                Config::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }
}
