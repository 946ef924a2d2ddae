//! # Provider SDK
//!
//! Adapters and resilience policies used by the action gateway.
//!
//! This crate provides:
//!
//! - The provider adapter contract (`ProviderAdapter`) and its identity types
//! - Concrete adapters for chat, search, browser, runtime and memory providers
//! - A normalized error type with per-provider HTTP error mapping
//! - Resilience policies (fixed-window rate limiting, keyed circuit breakers,
//!   retry with exponential backoff) composed behind one facade
//! - Configuration providers for credentials and policy settings
//!
//! ## Architecture
//!
//! - `ProviderAdapter`: flat capability interface every adapter implements
//! - `ProviderIdentity`: (resource, provider, endpoint class) key used for
//!   caching and circuit breaking
//! - `Resilience`: rate limit check, then circuit check, then attempt with retry
//! - `ProviderError`: error type with transient/permanent classification

pub mod core;
pub use core::{
    AdapterRequest, ClientBuilder, EndpointClass, ProviderAdapter, ProviderIdentity,
    ResourceKind, ResourceLifecycle,
};

pub mod services;

pub mod error;
pub use error::{ErrorContext, ProviderError, Result};

pub mod resilience;
pub use resilience::{
    Attempted, CircuitBreaker, CircuitBreakerRegistry, FixedWindowRateLimiter, Resilience,
    ResilienceConfig, ResilienceError, RetryExecutor,
};

pub mod config;
pub use config::{ConfigProvider, ProviderCredentials, ServiceConfig};

pub mod util;

#[cfg(test)]
mod tests;
