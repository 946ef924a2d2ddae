//! Gateway error taxonomy
//!
//! Every failure a caller can observe maps to exactly one `GatewayError`
//! variant, which fixes its HTTP status and whether retrying may help.

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use provider_sdk::util::{sanitize_for_logging, truncate_string};
use provider_sdk::{ProviderError, ResilienceError};
use serde::Serialize;
use thiserror::Error;

/// Upper bound on error messages returned to callers
const MAX_MESSAGE_LEN: usize = 512;

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Rate limit exceeded, window resets at {reset_at}")]
    RateLimited {
        reset_at: DateTime<Utc>,
        retry_after: Duration,
    },

    #[error("Circuit open for {identity}")]
    CircuitOpen { identity: String, retry_after: Duration },

    #[error("Upstream failure: {message}")]
    UpstreamFailure {
        message: String,
        category: &'static str,
        transient: bool,
        attempts: u32,
    },

    #[error("Dispatch cancelled after {}ms", .0.as_millis())]
    Cancelled(Duration),
}

/// Wire shape of an error in the dispatch response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    pub transient: bool,
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidEnvelope(message.into())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        GatewayError::UnknownProvider(message.into())
    }

    /// Adapter construction failed. Only the provider error's message is
    /// kept, after credential patterns are scrubbed.
    pub fn unavailable(identity: impl std::fmt::Display, source: &ProviderError) -> Self {
        GatewayError::AdapterUnavailable(scrub(&format!("{}: {}", identity, source)))
    }

    /// Taxonomy name as reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidEnvelope(_) => "InvalidEnvelope",
            GatewayError::UnknownProvider(_) => "UnknownProvider",
            GatewayError::AdapterUnavailable(_) => "AdapterUnavailable",
            GatewayError::RateLimited { .. } => "RateLimited",
            GatewayError::CircuitOpen { .. } => "CircuitOpen",
            GatewayError::UpstreamFailure { .. } => "UpstreamFailure",
            GatewayError::Cancelled(_) => "Cancelled",
        }
    }

    /// Whether the same envelope may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::InvalidEnvelope(_) | GatewayError::UnknownProvider(_) => false,
            GatewayError::AdapterUnavailable(_) => false,
            GatewayError::RateLimited { .. } | GatewayError::CircuitOpen { .. } => true,
            GatewayError::UpstreamFailure { transient, .. } => *transient,
            GatewayError::Cancelled(_) => true,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            GatewayError::AdapterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamFailure { category: "timeout", .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Suggested wait before retrying, when the error carries one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after, .. } | GatewayError::CircuitOpen { retry_after, .. } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// Attempts made against the provider before this error surfaced
    pub fn attempts(&self) -> u32 {
        match self {
            GatewayError::UpstreamFailure { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: scrub(&self.to_string()),
            transient: self.is_transient(),
        }
    }
}

impl From<ResilienceError> for GatewayError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::RateLimited { reset_at, retry_after } => GatewayError::RateLimited { reset_at, retry_after },
            ResilienceError::CircuitOpen { identity, retry_after } => GatewayError::CircuitOpen {
                identity: identity.to_string(),
                retry_after,
            },
            // Adapters reject bad parameters before any network call
            ResilienceError::Exhausted { source, .. } if matches!(source.root(), ProviderError::Validation(_)) => {
                GatewayError::InvalidEnvelope(scrub(&source.root().to_string()))
            }
            ResilienceError::Exhausted { source, attempts } => GatewayError::UpstreamFailure {
                message: scrub(&source.to_string()),
                category: source.category(),
                transient: source.is_transient(),
                attempts,
            },
        }
    }
}

fn scrub(message: &str) -> String {
    truncate_string(&sanitize_for_logging(message), MAX_MESSAGE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_sdk::{EndpointClass, ProviderIdentity, ResourceKind};

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(GatewayError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::unknown("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Cancelled(Duration::from_millis(5)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );

        let timeout = GatewayError::from(ResilienceError::Exhausted {
            source: ProviderError::timeout("read timed out"),
            attempts: 3,
        });
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.is_transient());
        assert_eq!(timeout.attempts(), 3);

        let auth = GatewayError::from(ResilienceError::Exhausted {
            source: ProviderError::authentication("bad key"),
            attempts: 1,
        });
        assert_eq!(auth.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!auth.is_transient());
    }

    #[test]
    fn test_adapter_validation_becomes_invalid_envelope() {
        let err = GatewayError::from(ResilienceError::Exhausted {
            source: ProviderError::validation("parameter 'url' is required"),
            attempts: 1,
        });
        assert_eq!(err.kind(), "InvalidEnvelope");
    }

    #[test]
    fn test_circuit_open_carries_identity_and_hint() {
        let identity = ProviderIdentity::new(ResourceKind::Search, "tavily", EndpointClass::RemoteManaged);
        let err = GatewayError::from(ResilienceError::CircuitOpen {
            identity,
            retry_after: Duration::from_secs(12),
        });

        assert_eq!(err.kind(), "CircuitOpen");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert!(err.to_string().contains("search/tavily@remote-managed"));
    }

    #[test]
    fn test_unavailable_message_is_scrubbed() {
        let source = ProviderError::configuration("rejected key sk-abcdefghijklmnopqrstuvwxyz123456");
        let err = GatewayError::unavailable("runtime/e2b@remote-managed", &source);

        let body = err.to_body();
        assert_eq!(body.kind, "AdapterUnavailable");
        assert!(!body.transient);
        assert!(!body.message.contains("sk-abcdefghijklmnopqrstuvwxyz123456"));
    }
}
