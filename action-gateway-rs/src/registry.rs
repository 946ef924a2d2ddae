//! Adapter registry
//!
//! Adapters are built on first use and cached by `ProviderIdentity`. Each
//! identity owns its own init cell, so construction of one provider never
//! waits on another and concurrent first calls build the adapter once.

use std::sync::Arc;

use dashmap::DashMap;
use provider_sdk::{EndpointClass, ProviderAdapter, ProviderError, ProviderIdentity, ResourceKind};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Builds adapters for one endpoint class
#[cfg_attr(test, mockall::automock)]
pub trait AdapterFactory: Send + Sync {
    fn endpoint_class(&self) -> EndpointClass;

    /// Whether `provider` is a known name for `resource` in this class
    fn supports(&self, resource: ResourceKind, provider: &str) -> bool;

    fn build(&self, identity: &ProviderIdentity) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;
}

type AdapterCell = Arc<OnceCell<Arc<dyn ProviderAdapter>>>;

pub struct AdapterRegistry {
    factory: Arc<dyn AdapterFactory>,
    adapters: DashMap<ProviderIdentity, AdapterCell>,
}

impl AdapterRegistry {
    pub fn new(factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            factory,
            adapters: DashMap::new(),
        }
    }

    pub fn endpoint_class(&self) -> EndpointClass {
        self.factory.endpoint_class()
    }

    pub fn identity(&self, resource: ResourceKind, provider: &str) -> ProviderIdentity {
        ProviderIdentity::new(resource, provider, self.factory.endpoint_class())
    }

    /// Cached adapter for (resource, provider), building it if needed.
    ///
    /// Unknown names are `UnknownProvider`; construction failures are
    /// `AdapterUnavailable` and leave the cell empty for the next caller.
    pub async fn get(&self, resource: ResourceKind, provider: &str) -> Result<Arc<dyn ProviderAdapter>, GatewayError> {
        if !self.factory.supports(resource, provider) {
            return Err(GatewayError::unknown(format!(
                "no {} provider named '{}' in {} mode",
                resource,
                provider,
                self.factory.endpoint_class()
            )));
        }

        let identity = self.identity(resource, provider);
        // Clone the cell out so the map shard is not held across the await
        let cell = self.adapters.entry(identity.clone()).or_default().clone();

        let adapter = cell
            .get_or_try_init(|| async {
                debug!(identity = %identity, "Building adapter");
                self.factory.build(&identity).map_err(|e| {
                    warn!(identity = %identity, category = e.category(), "Adapter construction failed");
                    GatewayError::unavailable(&identity, &e)
                })
            })
            .await?;

        Ok(adapter.clone())
    }

    /// Identities with a constructed adapter
    pub fn cached(&self) -> Vec<ProviderIdentity> {
        self.adapters
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use provider_sdk::{AdapterRequest, ResourceLifecycle};
    use serde_json::{json, Value};

    struct StaticAdapter {
        identity: ProviderIdentity,
    }

    #[async_trait]
    impl ProviderAdapter for StaticAdapter {
        fn identity(&self) -> &ProviderIdentity {
            &self.identity
        }

        fn lifecycle(&self) -> ResourceLifecycle {
            ResourceLifecycle::Stateless
        }

        fn supports_action(&self, _action: &str) -> bool {
            true
        }

        async fn execute(&self, _request: &AdapterRequest) -> provider_sdk::Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    fn mock_factory() -> MockAdapterFactory {
        let mut factory = MockAdapterFactory::new();
        factory.expect_endpoint_class().return_const(EndpointClass::SelfHosted);
        factory
            .expect_supports()
            .returning(|resource, name| resource == ResourceKind::Search && name == "searxng");
        factory
    }

    #[tokio::test]
    async fn test_builds_once_and_caches() {
        let mut factory = mock_factory();
        factory.expect_build().times(1).returning(|identity| {
            Ok(Arc::new(StaticAdapter {
                identity: identity.clone(),
            }) as Arc<dyn ProviderAdapter>)
        });

        let registry = Arc::new(AdapterRegistry::new(Arc::new(factory)));

        let calls = (0..8).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get(ResourceKind::Search, "searxng").await })
        });
        for call in futures::future::join_all(calls).await {
            assert!(call.unwrap().is_ok());
        }

        assert_eq!(registry.cached().len(), 1);
        assert_eq!(registry.cached()[0].endpoint_class, EndpointClass::SelfHosted);
    }

    #[tokio::test]
    async fn test_construction_failure_is_not_cached() {
        let mut factory = mock_factory();
        let mut seq = mockall::Sequence::new();
        factory
            .expect_build()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProviderError::configuration("searxng base URL is required")));
        factory
            .expect_build()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|identity| {
                Ok(Arc::new(StaticAdapter {
                    identity: identity.clone(),
                }) as Arc<dyn ProviderAdapter>)
            });

        let registry = AdapterRegistry::new(Arc::new(factory));

        let first = registry.get(ResourceKind::Search, "searxng").await;
        assert!(matches!(first, Err(GatewayError::AdapterUnavailable(_))));
        assert!(registry.cached().is_empty());

        assert!(registry.get(ResourceKind::Search, "searxng").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_never_builds() {
        let mut factory = mock_factory();
        factory.expect_build().never();

        let registry = AdapterRegistry::new(Arc::new(factory));
        let err = registry.get(ResourceKind::Search, "bing").await.err().unwrap();

        assert_eq!(err.kind(), "UnknownProvider");
    }
}
