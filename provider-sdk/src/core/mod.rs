//! Core abstractions for provider adapters
//!
//! - `ProviderAdapter`: the capability interface every adapter implements
//! - `ProviderIdentity`: stable key for one (resource, provider, endpoint class)
//! - `ResourceLifecycle`: who owns the remote resources an adapter creates
//! - `AdapterRequest`: one action with its parameters, handed to `execute`
//! - `ClientBuilder`: builder for the HTTP transport adapters share

pub mod builder;
pub use builder::{AuthScheme, ClientBuilder};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

/// The capability family an envelope targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Chat,
    Search,
    Browser,
    Runtime,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Chat,
        ResourceKind::Search,
        ResourceKind::Browser,
        ResourceKind::Runtime,
        ResourceKind::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Chat => "chat",
            ResourceKind::Search => "search",
            ResourceKind::Browser => "browser",
            ResourceKind::Runtime => "runtime",
            ResourceKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(ResourceKind::Chat),
            "search" => Ok(ResourceKind::Search),
            "browser" => Ok(ResourceKind::Browser),
            "runtime" => Ok(ResourceKind::Runtime),
            "memory" => Ok(ResourceKind::Memory),
            other => Err(ProviderError::validation(format!("unknown resource '{}'", other))),
        }
    }
}

/// Where an adapter's provider runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointClass {
    /// Provider APIs holding session state on their side
    RemoteManaged,
    /// Local equivalents driven directly by the gateway
    SelfHosted,
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointClass::RemoteManaged => f.write_str("remote-managed"),
            EndpointClass::SelfHosted => f.write_str("self-hosted"),
        }
    }
}

/// Stable key for one adapter: used as the registry cache key and the
/// circuit breaker key. Immutable once the adapter is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIdentity {
    pub resource: ResourceKind,
    pub provider_name: String,
    pub endpoint_class: EndpointClass,
}

impl ProviderIdentity {
    pub fn new(
        resource: ResourceKind,
        provider_name: impl Into<String>,
        endpoint_class: EndpointClass,
    ) -> Self {
        Self {
            resource,
            provider_name: provider_name.into(),
            endpoint_class,
        }
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.resource, self.provider_name, self.endpoint_class)
    }
}

/// Ownership of the remote resources an adapter touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLifecycle {
    /// Nothing outlives a call
    Stateless,
    /// Resources are provisioned and torn down inside one call
    ScopedPerCall,
    /// Resources outlive the call and are released by the caller
    ScopedByCaller,
}

/// One action handed to an adapter
#[derive(Debug, Clone, Default)]
pub struct AdapterRequest {
    pub action: String,
    pub parameters: Map<String, Value>,
    pub session_id: Option<String>,
}

impl AdapterRequest {
    pub fn new(action: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            parameters,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string parameter or a validation error
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.opt_str(key)
            .ok_or_else(|| ProviderError::validation(format!("parameter '{}' is required", key)))
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.param(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn opt_u64(&self, key: &str) -> Option<u64> {
        self.param(key).and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_f64(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(|v| v.as_f64())
    }

    pub fn opt_bool(&self, key: &str) -> Option<bool> {
        self.param(key).and_then(|v| v.as_bool())
    }
}

/// Flat capability interface for every provider adapter
///
/// Adapters normalize their provider's response into the gateway payload
/// shape before returning; the gateway never inspects vendor fields.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identity this adapter was built for
    fn identity(&self) -> &ProviderIdentity;

    /// Who releases resources the adapter creates
    fn lifecycle(&self) -> ResourceLifecycle;

    /// Whether this adapter can run the named action
    fn supports_action(&self, action: &str) -> bool;

    /// Run one action against the provider
    async fn execute(&self, request: &AdapterRequest) -> Result<Value>;
}
