//! Error handling for provider adapters
//!
//! This module provides the error type every adapter returns:
//! - Categorizes errors by type (network, auth, rate limit, upstream, etc.)
//! - Classifies each error as transient or permanent for the retry policy
//! - Carries optional context (provider, status code, endpoint)
//! - Maps provider-specific HTTP errors to normalized variants (see `mapping`)

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Main error type for provider adapters
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (permission or quota issues)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// The upstream provider throttled us
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Upstream server-side failures (5xx)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Provider rejected the request for a provider-specific reason
    #[error("Service error: {0}")]
    Service(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors (missing credentials, bad URLs)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ProviderError>,
        context: ErrorContext,
    },
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        ProviderError::Network(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ProviderError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ProviderError::Authorization(message.into())
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        ProviderError::RateLimit(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ProviderError::Upstream(message.into())
    }

    pub fn service(message: impl Into<String>) -> Self {
        ProviderError::Service(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ProviderError::Validation(message.into())
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        ProviderError::Parsing(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ProviderError::Configuration(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ProviderError::Timeout(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ProviderError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ProviderError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ProviderError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The innermost error, with all context layers stripped
    pub fn root(&self) -> &ProviderError {
        match self {
            ProviderError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Get the provider name if available
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            ProviderError::WithContext { context, .. } => Some(context.service.as_str()),
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Transient errors may succeed when retried: network failures,
    /// timeouts, upstream 5xx and upstream throttling.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Timeout(_) => true,
            ProviderError::Upstream(_) => true,
            ProviderError::RateLimit(_) => true,
            ProviderError::WithContext { inner, .. } => inner.is_transient(),
            _ => false,
        }
    }

    /// Check if this is a permanent error (not retryable)
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Short machine-readable category name
    pub fn category(&self) -> &'static str {
        match self.root() {
            ProviderError::Network(_) => "network",
            ProviderError::Authentication(_) => "authentication",
            ProviderError::Authorization(_) => "authorization",
            ProviderError::RateLimit(_) => "rate_limit",
            ProviderError::Upstream(_) => "upstream",
            ProviderError::Service(_) => "service",
            ProviderError::Validation(_) => "validation",
            ProviderError::Parsing(_) => "parsing",
            ProviderError::Configuration(_) => "configuration",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::NotFound(_) => "not_found",
            ProviderError::Internal(_) => "internal",
            ProviderError::WithContext { .. } => "unknown",
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Provider that generated the error
    pub service: String,

    /// Time the error was observed
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Provider-specific error code
    pub error_code: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific provider
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to ProviderError
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        // reqwest includes the full URL in its Display output; query strings
        // may carry api keys, so only the category is kept.
        let provider_error = if err.is_timeout() {
            ProviderError::timeout("request timed out")
        } else if err.is_connect() {
            ProviderError::network("connection failed")
        } else if err.is_redirect() {
            ProviderError::network("too many redirects")
        } else if err.is_decode() {
            ProviderError::parsing("response body could not be decoded")
        } else if err.is_body() {
            ProviderError::network("response body interrupted")
        } else if err.is_builder() {
            ProviderError::configuration("invalid request configuration")
        } else if err.is_request() {
            ProviderError::network("request could not be sent")
        } else {
            ProviderError::internal("http client error")
        };

        if let Some(status) = err.status() {
            provider_error.with_context(context.status_code(status.as_u16()))
        } else {
            provider_error.with_context(context)
        }
    }
}

/// Convert serde_json errors to ProviderError
impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
