//! Error mapping for provider APIs
//!
//! Converts provider-specific error responses to the normalized
//! `ProviderError` type. Each provider reports its error message in a
//! different place; the status code decides the variant.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ProviderError};
use crate::util::{sanitize_for_logging, truncate_string};

/// Longest upstream message we carry forward
const MAX_MESSAGE_LEN: usize = 200;

/// Map a status code and message to the matching error variant
pub fn error_for_status(status: StatusCode, message: impl Into<String>) -> ProviderError {
    let message = message.into();
    match status.as_u16() {
        400 | 422 => ProviderError::validation(message),
        401 => ProviderError::authentication(message),
        402 | 403 => ProviderError::authorization(message),
        404 => ProviderError::not_found(message),
        408 => ProviderError::timeout(message),
        429 => ProviderError::rate_limit(message),
        500..=599 => ProviderError::upstream(message),
        _ => ProviderError::service(message),
    }
}

/// Pull the human-readable message out of a provider's error body
pub fn extract_error_message(provider: &str, json: &Value) -> Option<String> {
    let message = match provider {
        // {"error": {"type": "...", "message": "..."}}
        "openai" | "deepseek" | "groq" | "perplexity" | "ollama" | "anthropic" | "google" => json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str()),
        // {"error": "..."}
        "serpapi" | "mem0" => json.get("error").and_then(|e| e.as_str()),
        // {"detail": {"error": "..."}} or {"detail": "..."}
        "tavily" => json
            .get("detail")
            .and_then(|d| d.get("error").and_then(|e| e.as_str()).or_else(|| d.as_str())),
        // W3C WebDriver: {"value": {"error": "...", "message": "..."}}
        "webdriver" => json
            .get("value")
            .and_then(|v| v.get("message"))
            .and_then(|m| m.as_str()),
        _ => None,
    };

    message
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
        .or_else(|| json.get("error").and_then(|m| m.as_str()))
        .map(|m| m.to_string())
}

/// Map an HTTP error response to a ProviderError
///
/// The message is sanitized and truncated; raw bodies never reach callers.
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ProviderError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(code) = json
            .get("error")
            .and_then(|e| e.get("code").or_else(|| e.get("type")))
            .and_then(|c| c.as_str())
        {
            context.error_code = Some(code.to_string());
        }

        if let Some(message) = extract_error_message(&context.service, &json) {
            return error_for_status(status, clean_message(&message));
        }
    }

    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, clean_message(body))
    };

    error_for_status(status, message)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 | 422 => "validation",
        401 => "authentication",
        402 | 403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

fn clean_message(message: &str) -> String {
    truncate_string(&sanitize_for_logging(message.trim()), MAX_MESSAGE_LEN)
}
