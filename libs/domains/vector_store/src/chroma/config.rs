use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};

const DEFAULT_URL: &str = "http://localhost:8000";
const DEFAULT_TENANT: &str = "default_tenant";
const DEFAULT_DATABASE: &str = "default_database";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chroma server configuration
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: String,
    pub tenant: String,
    pub database: String,
    pub timeout_secs: u64,
}

impl ChromaConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_database(mut self, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self.database = database.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Base URL for collection endpoints of the configured tenant and database
    pub fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.url.trim_end_matches('/'),
            self.tenant,
            self.database
        )
    }
}

impl FromEnv for ChromaConfig {
    /// - CHROMA_URL: defaults to http://localhost:8000
    /// - CHROMA_TENANT / CHROMA_DATABASE: default to Chroma's defaults
    /// - CHROMA_TIMEOUT_SECS: defaults to 30
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("CHROMA_URL", DEFAULT_URL),
            tenant: env_or_default("CHROMA_TENANT", DEFAULT_TENANT),
            database: env_or_default("CHROMA_DATABASE", DEFAULT_DATABASE),
            timeout_secs: env_parse_or("CHROMA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_url() {
        let config = ChromaConfig::new("http://chroma:8000/").with_database("acme", "docs");
        assert_eq!(
            config.collections_url(),
            "http://chroma:8000/api/v2/tenants/acme/databases/docs/collections"
        );
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("CHROMA_URL", None::<&str>),
                ("CHROMA_TENANT", None::<&str>),
                ("CHROMA_DATABASE", None::<&str>),
                ("CHROMA_TIMEOUT_SECS", None::<&str>),
            ],
            || {
                let config = ChromaConfig::from_env().unwrap();
                assert_eq!(config.url, "http://localhost:8000");
                assert_eq!(config.tenant, "default_tenant");
                assert_eq!(config.database, "default_database");
            },
        );
    }
}
