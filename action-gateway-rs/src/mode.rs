//! Deployment mode selection
//!
//! The mode is read once, on first use, and the resulting adapter set is
//! kept for the life of the selector. Concurrent first callers share one
//! initialization; a failed one leaves the selector empty so the next
//! caller tries again.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use provider_sdk::config::{ConfigProvider, ConfigProviderExt};
use provider_sdk::{EndpointClass, ProviderAdapter, ResourceKind};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::factory::{remote_providers, self_hosted_providers, RemoteManagedFactory, SelfHostedFactory};
use crate::registry::{AdapterFactory, AdapterRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    RemoteManaged,
    SelfHosted,
}

impl DeploymentMode {
    pub fn endpoint_class(&self) -> EndpointClass {
        match self {
            DeploymentMode::RemoteManaged => EndpointClass::RemoteManaged,
            DeploymentMode::SelfHosted => EndpointClass::SelfHosted,
        }
    }

    /// Provider used when an envelope carries no hint
    pub fn default_provider(&self, resource: ResourceKind) -> &'static str {
        match (self, resource) {
            (DeploymentMode::RemoteManaged, ResourceKind::Chat) => "anthropic",
            (DeploymentMode::RemoteManaged, ResourceKind::Search) => "tavily",
            (DeploymentMode::RemoteManaged, ResourceKind::Browser) => "browserbase",
            (DeploymentMode::RemoteManaged, ResourceKind::Runtime) => "e2b",
            (DeploymentMode::RemoteManaged, ResourceKind::Memory) => "mem0",
            (DeploymentMode::SelfHosted, ResourceKind::Chat) => "ollama",
            (DeploymentMode::SelfHosted, ResourceKind::Search) => "searxng",
            (DeploymentMode::SelfHosted, ResourceKind::Browser) => "webdriver",
            (DeploymentMode::SelfHosted, ResourceKind::Runtime) => "local",
            (DeploymentMode::SelfHosted, ResourceKind::Memory) => "local",
        }
    }

    pub fn known_providers(&self, resource: ResourceKind) -> &'static [&'static str] {
        match self {
            DeploymentMode::RemoteManaged => remote_providers(resource),
            DeploymentMode::SelfHosted => self_hosted_providers(resource),
        }
    }

    /// `deployment_mode` wins; `cloud_mode` is the boolean form. Remote-managed
    /// when neither is set.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self, GatewayError> {
        if let Some(mode) = provider.get_opt("deployment_mode") {
            return mode.parse();
        }

        match provider.get_opt("cloud_mode") {
            Some(_) => provider
                .get_bool("cloud_mode")
                .map(|cloud| if cloud { DeploymentMode::RemoteManaged } else { DeploymentMode::SelfHosted })
                .map_err(|e| GatewayError::AdapterUnavailable(e.to_string())),
            None => Ok(DeploymentMode::RemoteManaged),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.endpoint_class(), f)
    }
}

impl FromStr for DeploymentMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "remote-managed" | "remote" | "cloud" => Ok(DeploymentMode::RemoteManaged),
            "self-hosted" | "local" => Ok(DeploymentMode::SelfHosted),
            other => Err(GatewayError::AdapterUnavailable(format!("unknown deployment mode '{}'", other))),
        }
    }
}

/// Adapters and default providers for one mode
pub struct AdapterSet {
    mode: DeploymentMode,
    registry: AdapterRegistry,
    defaults: HashMap<ResourceKind, String>,
}

impl AdapterSet {
    pub fn new(mode: DeploymentMode, factory: Arc<dyn AdapterFactory>) -> Self {
        let defaults = ResourceKind::ALL
            .iter()
            .map(|resource| (*resource, mode.default_provider(*resource).to_string()))
            .collect();

        Self {
            mode,
            registry: AdapterRegistry::new(factory),
            defaults,
        }
    }

    /// Override the default provider for one resource
    pub fn with_default(mut self, resource: ResourceKind, provider: impl Into<String>) -> Self {
        self.defaults.insert(resource, provider.into());
        self
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn default_provider(&self, resource: ResourceKind) -> &str {
        self.defaults
            .get(&resource)
            .map(String::as_str)
            .unwrap_or_else(|| self.mode.default_provider(resource))
    }
}

/// An adapter set narrowed to one resource
#[derive(Clone)]
pub struct AdapterSetHandle {
    set: Arc<AdapterSet>,
    resource: ResourceKind,
}

impl AdapterSetHandle {
    pub fn resource(&self) -> ResourceKind {
        self.resource
    }

    pub fn mode(&self) -> DeploymentMode {
        self.set.mode
    }

    /// The hinted provider, or the resource default when the hint is absent or blank
    pub fn provider_name(&self, hint: Option<&str>) -> String {
        match hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => hint.to_ascii_lowercase(),
            None => self.set.default_provider(self.resource).to_string(),
        }
    }

    pub async fn adapter(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>, GatewayError> {
        self.set.registry.get(self.resource, provider).await
    }
}

/// Produces the adapter set when the selector is first used
#[async_trait]
pub trait AdapterSetLoader: Send + Sync {
    async fn load(&self) -> Result<AdapterSet, GatewayError>;
}

/// Loader reading `deployment_mode` and `default_provider_<resource>`
pub struct ConfigAdapterSetLoader {
    config: Arc<dyn ConfigProvider>,
}

impl ConfigAdapterSetLoader {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdapterSetLoader for ConfigAdapterSetLoader {
    async fn load(&self) -> Result<AdapterSet, GatewayError> {
        let mode = DeploymentMode::from_provider(self.config.as_ref())?;

        let factory: Arc<dyn AdapterFactory> = match mode {
            DeploymentMode::RemoteManaged => Arc::new(RemoteManagedFactory::new(self.config.clone())),
            DeploymentMode::SelfHosted => Arc::new(SelfHostedFactory::new(self.config.clone())),
        };

        let mut set = AdapterSet::new(mode, factory);
        for resource in ResourceKind::ALL {
            let key = format!("default_provider_{}", resource);
            if let Some(provider) = self.config.get_opt(&key) {
                let provider = provider.trim().to_ascii_lowercase();
                if !mode.known_providers(resource).contains(&provider.as_str()) {
                    return Err(GatewayError::AdapterUnavailable(format!(
                        "{} provider '{}' is not available in {} mode",
                        resource, provider, mode
                    )));
                }
                set = set.with_default(resource, provider);
            }
        }

        Ok(set)
    }
}

/// Process-wide switch between the two adapter sets
pub struct ModeSelector {
    loader: Arc<dyn AdapterSetLoader>,
    current: OnceCell<Arc<AdapterSet>>,
}

impl ModeSelector {
    pub fn new(loader: Arc<dyn AdapterSetLoader>) -> Self {
        Self {
            loader,
            current: OnceCell::new(),
        }
    }

    /// Selector that is already initialized with `set`
    pub fn with_set(set: AdapterSet) -> Self {
        struct Preloaded;

        #[async_trait]
        impl AdapterSetLoader for Preloaded {
            async fn load(&self) -> Result<AdapterSet, GatewayError> {
                Err(GatewayError::AdapterUnavailable("adapter set was preloaded".to_string()))
            }
        }

        Self {
            loader: Arc::new(Preloaded),
            current: OnceCell::new_with(Some(Arc::new(set))),
        }
    }

    async fn adapter_set(&self) -> Result<Arc<AdapterSet>, GatewayError> {
        let set = self
            .current
            .get_or_try_init(|| async {
                match self.loader.load().await {
                    Ok(set) => {
                        info!(mode = %set.mode(), "Adapter set initialized");
                        Ok(Arc::new(set))
                    }
                    Err(e) => {
                        warn!(error = %e, "Adapter set initialization failed");
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(set.clone())
    }

    pub async fn resolve_adapter_set(&self, resource: ResourceKind) -> Result<AdapterSetHandle, GatewayError> {
        Ok(AdapterSetHandle {
            set: self.adapter_set().await?,
            resource,
        })
    }

    /// Mode in effect, if initialization has happened
    pub fn mode(&self) -> Option<DeploymentMode> {
        self.current.get().map(|set| set.mode())
    }
}
