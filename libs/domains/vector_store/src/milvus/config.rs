use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse_or};

const DEFAULT_URI: &str = "http://localhost:19530";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Milvus connection configuration
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    pub uri: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl MilvusConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl FromEnv for MilvusConfig {
    /// - MILVUS_URI: defaults to http://localhost:19530
    /// - MILVUS_TOKEN: optional, `user:password` or an API key
    /// - MILVUS_TIMEOUT_SECS: defaults to 30
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            uri: env_or_default("MILVUS_URI", DEFAULT_URI),
            token: env_optional("MILVUS_TOKEN"),
            timeout_secs: env_parse_or("MILVUS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("MILVUS_URI", None::<&str>),
                ("MILVUS_TOKEN", None::<&str>),
                ("MILVUS_TIMEOUT_SECS", None::<&str>),
            ],
            || {
                let config = MilvusConfig::from_env().unwrap();
                assert_eq!(config.uri, "http://localhost:19530");
                assert_eq!(config.token, None);
                assert_eq!(config.timeout_secs, 30);
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_timeout() {
        temp_env::with_var("MILVUS_TIMEOUT_SECS", Some("forever"), || {
            assert!(MilvusConfig::from_env().is_err());
        });
    }
}
