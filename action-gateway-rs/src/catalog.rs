//! Known (resource, action) pairs
//!
//! Anything not listed here is rejected before a provider is resolved.
//! The idempotent flag decides whether a call may be retried.

use provider_sdk::ResourceKind;
use serde_json::{Map, Value};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub resource: ResourceKind,
    pub action: &'static str,
    pub idempotent: bool,
    /// Parameters that must be present and non-null
    pub required: &'static [&'static str],
}

const fn spec(
    resource: ResourceKind,
    action: &'static str,
    idempotent: bool,
    required: &'static [&'static str],
) -> ActionSpec {
    ActionSpec {
        resource,
        action,
        idempotent,
        required,
    }
}

pub static CATALOG: &[ActionSpec] = &[
    spec(ResourceKind::Chat, "send", false, &["message"]),
    spec(ResourceKind::Chat, "clear", false, &[]),
    spec(ResourceKind::Search, "web", true, &["query"]),
    spec(ResourceKind::Browser, "navigate", false, &["url"]),
    spec(ResourceKind::Browser, "click", false, &["selector"]),
    spec(ResourceKind::Browser, "type", false, &["selector", "text"]),
    spec(ResourceKind::Browser, "screenshot", true, &[]),
    spec(ResourceKind::Browser, "extract", true, &["selector"]),
    spec(ResourceKind::Browser, "scrape", true, &["url"]),
    spec(ResourceKind::Browser, "close", false, &[]),
    spec(ResourceKind::Runtime, "execute", false, &["code"]),
    spec(ResourceKind::Memory, "add", false, &["userId", "messages"]),
    spec(ResourceKind::Memory, "search", true, &["userId", "query"]),
    spec(ResourceKind::Memory, "get", true, &["userId", "memoryId"]),
    spec(ResourceKind::Memory, "list", true, &["userId"]),
    spec(ResourceKind::Memory, "update", false, &["userId", "memoryId", "data"]),
    spec(ResourceKind::Memory, "delete", false, &["userId", "memoryId"]),
];

/// Resolve a pair; unknown resources and actions are both `UnknownProvider`
pub fn lookup(resource: &str, action: &str) -> Result<&'static ActionSpec, GatewayError> {
    let kind: ResourceKind = resource
        .parse()
        .map_err(|_| GatewayError::unknown(format!("no adapter serves resource '{}'", resource)))?;

    CATALOG
        .iter()
        .find(|s| s.resource == kind && s.action == action)
        .ok_or_else(|| GatewayError::unknown(format!("resource '{}' has no action '{}'", resource, action)))
}

/// Actions listed for one resource
pub fn actions_for(resource: ResourceKind) -> impl Iterator<Item = &'static ActionSpec> {
    CATALOG.iter().filter(move |s| s.resource == resource)
}

impl ActionSpec {
    pub fn check_required(&self, parameters: &Map<String, Value>) -> Result<(), GatewayError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|key| parameters.get(*key).map_or(true, Value::is_null))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::invalid(format!(
                "{}.{} requires parameter(s): {}",
                self.resource,
                self.action,
                missing.join(", ")
            )))
        }
    }
}
