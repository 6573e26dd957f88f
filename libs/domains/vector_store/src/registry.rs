use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use core_config::FromEnv;
use tracing::{debug, warn};

use crate::adapter::{Connector, ProviderAdapter};
use crate::chroma::{ChromaConfig, ChromaConnector};
use crate::error::{StoreError, StoreResult};
use crate::local::LocalStore;
use crate::milvus::{MilvusConfig, MilvusConnector};
use crate::models::{Provider, ProviderInfo};
use crate::qdrant::{QdrantConfig, QdrantConnector};

/// How a provider's adapter is obtained
pub enum Binding {
    /// Process-wide adapter, reused by every call
    Shared(Arc<dyn ProviderAdapter>),
    /// Fresh connection per call, released when the lease drops
    Scoped(Arc<dyn Connector>),
}

impl Binding {
    fn is_available(&self) -> bool {
        match self {
            Binding::Shared(adapter) => adapter.is_available(),
            Binding::Scoped(connector) => connector.is_available(),
        }
    }
}

/// Maps provider ids to their adapters
#[derive(Default)]
pub struct ProviderRegistry {
    bindings: BTreeMap<Provider, Binding>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend configured from the environment.
    ///
    /// The local store is opened under `local_dir`.
    pub fn from_env(local_dir: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new()
            .with_scoped(Arc::new(MilvusConnector::new(MilvusConfig::from_env()?)))
            .with_scoped(Arc::new(QdrantConnector::new(QdrantConfig::from_env()?)))
            .with_scoped(Arc::new(ChromaConnector::new(ChromaConfig::from_env()?)))
            .with_shared(LocalStore::shared(local_dir)?))
    }

    pub fn with_shared(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.bindings.insert(adapter.provider(), Binding::Shared(adapter));
        self
    }

    pub fn with_scoped(mut self, connector: Arc<dyn Connector>) -> Self {
        self.bindings.insert(connector.provider(), Binding::Scoped(connector));
        self
    }

    pub fn is_registered(&self, provider: Provider) -> bool {
        self.bindings.contains_key(&provider)
    }

    pub fn is_available(&self, provider: Provider) -> bool {
        self.bindings
            .get(&provider)
            .is_some_and(Binding::is_available)
    }

    /// Registered providers with their availability on this host
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.bindings
            .iter()
            .map(|(provider, binding)| ProviderInfo {
                id: *provider,
                name: provider.display_name().to_string(),
                available: binding.is_available(),
            })
            .collect()
    }

    /// Obtain an adapter for one call
    pub async fn acquire(&self, provider: Provider) -> StoreResult<Lease> {
        let binding = self
            .bindings
            .get(&provider)
            .ok_or_else(|| StoreError::NotFound(format!("Provider '{}' is not registered", provider)))?;

        if !binding.is_available() {
            warn!(%provider, "Provider is not available on this host");
            return Err(StoreError::BackendUnavailable(format!(
                "Provider '{}' is not available on this host",
                provider
            )));
        }

        let inner = match binding {
            Binding::Shared(adapter) => LeaseInner::Shared(Arc::clone(adapter)),
            Binding::Scoped(connector) => {
                let adapter = connector.connect().await?;
                debug!(%provider, "Opened backend connection");
                LeaseInner::Scoped(adapter)
            }
        };

        Ok(Lease { provider, inner })
    }
}

enum LeaseInner {
    Shared(Arc<dyn ProviderAdapter>),
    Scoped(Box<dyn ProviderAdapter>),
}

/// Adapter borrowed for a single call. Scoped connections close on drop.
pub struct Lease {
    provider: Provider,
    inner: LeaseInner,
}

impl Lease {
    pub fn provider(&self) -> Provider {
        self.provider
    }
}

impl Deref for Lease {
    type Target = dyn ProviderAdapter;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            LeaseInner::Shared(adapter) => adapter.as_ref(),
            LeaseInner::Scoped(adapter) => adapter.as_ref(),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if matches!(self.inner, LeaseInner::Scoped(_)) {
            debug!(provider = %self.provider, "Released backend connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MockConnector, MockProviderAdapter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared(provider: Provider, available: bool) -> Arc<dyn ProviderAdapter> {
        let mut mock = MockProviderAdapter::new();
        mock.expect_provider().return_const(provider);
        mock.expect_is_available().return_const(available);
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_acquire_unregistered_provider_is_not_found() {
        let registry = ProviderRegistry::new().with_shared(shared(Provider::Local, true));

        let result = registry.acquire(Provider::Milvus).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_acquire_unavailable_provider_fails() {
        let registry = ProviderRegistry::new().with_shared(shared(Provider::Milvus, false));

        let result = registry.acquire(Provider::Milvus).await;
        assert!(matches!(result, Err(StoreError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_scoped_binding_connects_per_acquire() {
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connects);

        let mut connector = MockConnector::new();
        connector.expect_provider().return_const(Provider::Qdrant);
        connector.expect_is_available().return_const(true);
        connector.expect_connect().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut adapter = MockProviderAdapter::new();
            adapter.expect_provider().return_const(Provider::Qdrant);
            Ok(Box::new(adapter) as Box<dyn ProviderAdapter>)
        });

        let registry = ProviderRegistry::new().with_scoped(Arc::new(connector));

        for _ in 0..2 {
            let lease = registry.acquire(Provider::Qdrant).await.unwrap();
            assert_eq!(lease.provider(), Provider::Qdrant);
        }
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_is_surfaced() {
        let mut connector = MockConnector::new();
        connector.expect_provider().return_const(Provider::Chroma);
        connector.expect_is_available().return_const(true);
        connector
            .expect_connect()
            .returning(|| Err(StoreError::BackendUnavailable("refused".to_string())));

        let registry = ProviderRegistry::new().with_scoped(Arc::new(connector));
        let result = registry.acquire(Provider::Chroma).await;
        assert!(matches!(result, Err(StoreError::BackendUnavailable(_))));
    }

    #[test]
    fn test_providers_lists_availability_in_stable_order() {
        let registry = ProviderRegistry::new()
            .with_shared(shared(Provider::Local, true))
            .with_shared(shared(Provider::Milvus, false));

        let providers = registry.providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].id, Provider::Milvus);
        assert!(!providers[0].available);
        assert_eq!(providers[1].id, Provider::Local);
        assert!(providers[1].available);
    }
}
