//! Resilience patterns for provider calls
//!
//! Three independent policies, always applied in this order:
//! - Fixed-window rate limiting per client key
//! - Circuit breaking per provider identity
//! - Retry with exponential backoff for idempotent calls
//!
//! `Resilience` composes them into one facade.

mod circuit_breaker;
mod rate_limit;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStatus, CircuitPermit,
    CircuitRejection, CircuitSnapshot,
};
pub use rate_limit::{FixedWindowRateLimiter, RateLimitExceeded, RateLimitStats};
pub use retry::{Attempted, RetryConfig, RetryExecutor};

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{ConfigProvider, ConfigProviderExt};
use crate::core::ProviderIdentity;
use crate::error::ProviderError;

/// Tunables for all three policies
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    pub circuit: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            circuit: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Load from `rate_limit_*`, `circuit_*` and `retry_*` keys; missing keys keep defaults
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let defaults = Self::default();

        Self {
            rate_limit_max_requests: provider
                .get::<u32>("rate_limit_max_requests")
                .unwrap_or(defaults.rate_limit_max_requests),
            rate_limit_window: provider.get_duration_or("rate_limit_window", defaults.rate_limit_window),
            circuit: CircuitBreakerConfig {
                failure_threshold: provider
                    .get::<u32>("circuit_failure_threshold")
                    .unwrap_or(defaults.circuit.failure_threshold)
                    .max(1),
                cooldown: provider.get_duration_or("circuit_cooldown", defaults.circuit.cooldown),
            },
            retry: RetryConfig {
                max_attempts: provider
                    .get::<u32>("retry_max_attempts")
                    .unwrap_or(defaults.retry.max_attempts)
                    .max(1),
                initial_interval: provider.get_duration_or("retry_base_delay", defaults.retry.initial_interval),
                max_interval: provider.get_duration_or("retry_max_delay", defaults.retry.max_interval),
                ..defaults.retry
            },
        }
    }
}

/// Why a resilience-wrapped call did not produce a value
#[derive(Error, Debug)]
pub enum ResilienceError {
    #[error("Rate limit exceeded for client, retry after {retry_after:?}")]
    RateLimited {
        reset_at: DateTime<Utc>,
        retry_after: Duration,
    },

    #[error("Circuit open for {identity}, retry after {retry_after:?}")]
    CircuitOpen {
        identity: ProviderIdentity,
        retry_after: Duration,
    },

    #[error("{source} (after {attempts} attempt(s))")]
    Exhausted {
        #[source]
        source: ProviderError,
        attempts: u32,
    },
}

/// Facade composing rate limiting, circuit breaking and retry
#[derive(Debug)]
pub struct Resilience {
    rate_limiter: FixedWindowRateLimiter,
    circuits: CircuitBreakerRegistry,
    retry: RetryExecutor,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl Resilience {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            rate_limiter: FixedWindowRateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window),
            circuits: CircuitBreakerRegistry::new(config.circuit),
            retry: RetryExecutor::new(config.retry),
        }
    }

    /// Run `operation` for `client_key` against `identity`.
    ///
    /// Rate-limit and circuit rejections never invoke the operation and never
    /// count as provider failures. Non-idempotent operations are attempted
    /// once. Only transient errors count against the circuit; any other
    /// outcome means the provider answered and resets it.
    pub async fn execute<F, Fut, T>(
        &self,
        client_key: &str,
        identity: &ProviderIdentity,
        idempotent: bool,
        operation: F,
    ) -> Result<Attempted<T>, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.rate_limiter
            .check(client_key)
            .map_err(|e| ResilienceError::RateLimited {
                reset_at: e.reset_at,
                retry_after: e.retry_after,
            })?;

        let permit = self
            .circuits
            .get(identity)
            .acquire()
            .map_err(|e| ResilienceError::CircuitOpen {
                identity: identity.clone(),
                retry_after: e.retry_after,
            })?;

        let outcome = if idempotent {
            self.retry.execute(operation).await
        } else {
            let mut operation = operation;
            self.retry.execute_once(|| operation()).await
        };

        match outcome {
            Ok(attempted) => {
                permit.record_success();
                Ok(attempted)
            }
            Err(Attempted { value, attempts }) => {
                if value.is_transient() {
                    permit.record_failure();
                } else {
                    permit.record_success();
                }
                Err(ResilienceError::Exhausted { source: value, attempts })
            }
        }
    }

    pub fn circuit_snapshot(&self, identity: &ProviderIdentity) -> Option<CircuitSnapshot> {
        self.circuits.snapshot(identity)
    }

    pub fn circuit_snapshots(&self) -> Vec<(ProviderIdentity, CircuitSnapshot)> {
        self.circuits.snapshots()
    }

    pub fn reset_circuit(&self, identity: &ProviderIdentity) {
        self.circuits.reset(identity);
    }

    pub fn rate_limiter(&self) -> &FixedWindowRateLimiter {
        &self.rate_limiter
    }
}
