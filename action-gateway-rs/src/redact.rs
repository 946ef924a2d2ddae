//! Secret redaction for audited parameters

use provider_sdk::util::{sanitize_for_logging, truncate_string};
use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";

/// Longest string value kept in an audit record
const MAX_AUDIT_STRING: usize = 2048;

/// Normalized key suffixes whose values are always dropped
const SENSITIVE_SUFFIXES: &[&str] = &[
    "apikey",
    "token",
    "secret",
    "password",
    "passwd",
    "authorization",
    "credential",
    "credentials",
    "privatekey",
    "accesskey",
    "cookie",
];

fn is_sensitive_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    SENSITIVE_SUFFIXES.iter().any(|suffix| normalized.ends_with(suffix))
}

/// Copy of `parameters` safe to persist: sensitive keys are replaced,
/// credential-looking substrings scrubbed and long strings truncated.
pub fn redact_parameters(parameters: &Map<String, Value>) -> Value {
    Value::Object(redact_map(parameters))
}

fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::String(REDACTED.to_string())
            } else {
                redact_value(value)
            };
            (key.clone(), value)
        })
        .collect()
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::String(text) => Value::String(truncate_string(&sanitize_for_logging(text), MAX_AUDIT_STRING)),
        other => other.clone(),
    }
}
