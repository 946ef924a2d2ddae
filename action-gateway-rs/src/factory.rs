//! Adapter factories for the two deployment modes
//!
//! Credentials and endpoints come from the shared `ConfigProvider`; a
//! missing required value fails construction with a configuration error
//! that names the setting, never its value.

use std::sync::Arc;

use provider_sdk::config::ConfigProvider;
use provider_sdk::services::browser::{self, BrowserbaseAdapter, WebDriverAdapter};
use provider_sdk::services::chat::{self, AnthropicAdapter, GoogleAdapter, OpenAICompatibleAdapter};
use provider_sdk::services::memory::{self, LocalMemoryAdapter, Mem0Adapter};
use provider_sdk::services::runtime::{self, E2bAdapter, LocalRuntimeAdapter};
use provider_sdk::services::search::{self, SearxngAdapter, SerpApiAdapter, TavilyAdapter};
use provider_sdk::{EndpointClass, ProviderAdapter, ProviderCredentials, ProviderError, ProviderIdentity, ResourceKind};

use crate::registry::AdapterFactory;

const REMOTE_CHAT: &[&str] = &["anthropic", "google", "openai", "deepseek", "groq", "perplexity"];

/// Known provider names per resource in remote-managed mode
pub fn remote_providers(resource: ResourceKind) -> &'static [&'static str] {
    match resource {
        ResourceKind::Chat => REMOTE_CHAT,
        ResourceKind::Search => &["tavily", "serpapi"],
        ResourceKind::Browser => &["browserbase"],
        ResourceKind::Runtime => &["e2b"],
        ResourceKind::Memory => &["mem0"],
    }
}

/// Known provider names per resource in self-hosted mode
pub fn self_hosted_providers(resource: ResourceKind) -> &'static [&'static str] {
    match resource {
        ResourceKind::Chat => &["ollama"],
        ResourceKind::Search => &["searxng"],
        ResourceKind::Browser => &["webdriver"],
        ResourceKind::Runtime => &["local"],
        ResourceKind::Memory => &["local"],
    }
}

fn unsupported(identity: &ProviderIdentity) -> ProviderError {
    ProviderError::configuration(format!("no adapter is registered for {}", identity))
}

fn share<A: ProviderAdapter + 'static>(adapter: A) -> Arc<dyn ProviderAdapter> {
    Arc::new(adapter)
}

/// Adapters calling hosted provider APIs
pub struct RemoteManagedFactory {
    config: Arc<dyn ConfigProvider>,
}

impl RemoteManagedFactory {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }

    fn credentials(&self, name: &str, default_base_url: &str, options: &[&str]) -> ProviderCredentials {
        ProviderCredentials::from_provider(self.config.as_ref(), name, default_base_url, options)
    }

    fn build_chat(&self, identity: &ProviderIdentity) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let name = identity.provider_name.as_str();
        if name == "anthropic" {
            let creds = self.credentials(name, chat::anthropic::DEFAULT_BASE_URL, &["model"]);
            return Ok(share(AnthropicAdapter::new(identity.clone(), &creds)?));
        }
        if name == "google" {
            let creds = self.credentials(name, chat::google::DEFAULT_BASE_URL, &["model"]);
            return Ok(share(GoogleAdapter::new(identity.clone(), &creds)?));
        }

        let (base_url, _) = chat::default_endpoint(name).ok_or_else(|| unsupported(identity))?;
        let creds = self.credentials(name, base_url, &["model"]);
        Ok(share(OpenAICompatibleAdapter::new(identity.clone(), &creds)?))
    }
}

impl AdapterFactory for RemoteManagedFactory {
    fn endpoint_class(&self) -> EndpointClass {
        EndpointClass::RemoteManaged
    }

    fn supports(&self, resource: ResourceKind, provider: &str) -> bool {
        remote_providers(resource).contains(&provider)
    }

    fn build(&self, identity: &ProviderIdentity) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let id = identity.clone();

        match (identity.resource, identity.provider_name.as_str()) {
            (ResourceKind::Chat, _) => self.build_chat(identity),
            (ResourceKind::Search, "tavily") => {
                let creds = self.credentials("tavily", search::tavily::DEFAULT_BASE_URL, &[]);
                Ok(share(TavilyAdapter::new(id, &creds)?))
            }
            (ResourceKind::Search, "serpapi") => {
                let creds = self.credentials("serpapi", search::serpapi::DEFAULT_BASE_URL, &["engine"]);
                Ok(share(SerpApiAdapter::new(id, &creds)?))
            }
            (ResourceKind::Browser, "browserbase") => {
                let creds = self.credentials("browserbase", browser::browserbase::DEFAULT_BASE_URL, &["project_id"]);
                let scrapybara = self.credentials("scrapybara", browser::browserbase::SCRAPYBARA_BASE_URL, &[]);
                Ok(share(BrowserbaseAdapter::new(id, &creds, Some(&scrapybara))?))
            }
            (ResourceKind::Runtime, "e2b") => {
                let creds = self.credentials("e2b", runtime::e2b::DEFAULT_BASE_URL, &["template"]);
                Ok(share(E2bAdapter::new(id, &creds)?))
            }
            (ResourceKind::Memory, "mem0") => {
                let creds = self.credentials("mem0", memory::mem0::DEFAULT_BASE_URL, &[]);
                Ok(share(Mem0Adapter::new(id, &creds)?))
            }
            _ => Err(unsupported(identity)),
        }
    }
}

/// Adapters driving local equivalents
pub struct SelfHostedFactory {
    config: Arc<dyn ConfigProvider>,
}

impl SelfHostedFactory {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }

    fn credentials(&self, name: &str, default_base_url: &str, options: &[&str]) -> ProviderCredentials {
        ProviderCredentials::from_provider(self.config.as_ref(), name, default_base_url, options)
    }
}

impl AdapterFactory for SelfHostedFactory {
    fn endpoint_class(&self) -> EndpointClass {
        EndpointClass::SelfHosted
    }

    fn supports(&self, resource: ResourceKind, provider: &str) -> bool {
        self_hosted_providers(resource).contains(&provider)
    }

    fn build(&self, identity: &ProviderIdentity) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let id = identity.clone();

        match (identity.resource, identity.provider_name.as_str()) {
            (ResourceKind::Chat, "ollama") => {
                let (base_url, _) = chat::default_endpoint("ollama").ok_or_else(|| unsupported(identity))?;
                let creds = self.credentials("ollama", base_url, &["model"]);
                Ok(share(OpenAICompatibleAdapter::new(id, &creds)?))
            }
            (ResourceKind::Search, "searxng") => {
                let creds = self.credentials("searxng", search::searxng::DEFAULT_BASE_URL, &[]);
                Ok(share(SearxngAdapter::new(id, &creds)?))
            }
            (ResourceKind::Browser, "webdriver") => {
                let creds = self.credentials("webdriver", browser::webdriver::DEFAULT_BASE_URL, &["browser"]);
                Ok(share(WebDriverAdapter::new(id, &creds)?))
            }
            (ResourceKind::Runtime, "local") => {
                let creds = self.credentials("local_runtime", "", &[]);
                Ok(share(LocalRuntimeAdapter::new(id, &creds)))
            }
            (ResourceKind::Memory, "local") => Ok(share(LocalMemoryAdapter::new(id))),
            _ => Err(unsupported(identity)),
        }
    }
}
