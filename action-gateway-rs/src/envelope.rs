//! Inbound action envelope and dispatch response

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorBody, GatewayError};

const MAX_SESSION_ID_LEN: usize = 256;
const MAX_NAME_LEN: usize = 64;

/// Lowercase ASCII identifier: a letter, then letters, digits, `_` or `-`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && name.len() <= MAX_NAME_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// `{resource, action, parameters, sessionId?, providerHint?}`
///
/// Fields are kept as received; `validate` enforces shape before anything
/// is resolved, and resolution decides whether the pair is known.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_hint: Option<String>,
}

impl ActionEnvelope {
    pub fn new(resource: impl Into<String>, action: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            parameters: Some(parameters),
            session_id: None,
            provider_hint: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_provider_hint(mut self, provider: impl Into<String>) -> Self {
        self.provider_hint = Some(provider.into());
        self
    }

    /// Parse a raw JSON body
    pub fn from_value(value: Value) -> Result<Self, GatewayError> {
        if !value.is_object() {
            return Err(GatewayError::invalid("envelope must be a JSON object"));
        }
        serde_json::from_value(value).map_err(|e| GatewayError::invalid(e.to_string()))
    }

    /// Best-effort read of a body that failed to parse, so the rejection
    /// can still be audited with whatever the caller sent
    pub fn salvage(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            resource: text("resource").unwrap_or_default(),
            action: text("action").unwrap_or_default(),
            parameters: value.get("parameters").and_then(Value::as_object).cloned(),
            session_id: text("sessionId"),
            provider_hint: text("providerHint"),
        }
    }

    /// Shape checks that need no knowledge of the catalog
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.resource.trim().is_empty() {
            return Err(GatewayError::invalid("'resource' is required"));
        }
        if self.action.trim().is_empty() {
            return Err(GatewayError::invalid("'action' is required"));
        }
        if !is_identifier(&self.resource) || !is_identifier(&self.action) {
            return Err(GatewayError::invalid("'resource' and 'action' must be lowercase identifiers"));
        }
        if self.parameters.is_none() {
            return Err(GatewayError::invalid("'parameters' must be an object"));
        }

        if let Some(ref session) = self.session_id {
            if session.trim().is_empty() || session.len() > MAX_SESSION_ID_LEN {
                return Err(GatewayError::invalid("'sessionId' must be 1-256 characters"));
            }
        }

        // Hints are matched trimmed and case-insensitively; a blank hint means none
        if let Some(hint) = self.provider_hint.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            if !is_identifier(&hint.to_ascii_lowercase()) {
                return Err(GatewayError::invalid("'providerHint' must be a provider name"));
            }
        }

        Ok(())
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.parameters.clone().unwrap_or_default()
    }
}

/// `{success, result?, error?}` returned for every dispatch
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl DispatchResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: &GatewayError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_body()),
        }
    }
}
