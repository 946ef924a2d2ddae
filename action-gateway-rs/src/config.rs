//! Gateway configuration
//!
//! Read from the `GATEWAY_*` environment through the SDK's config
//! providers. The deployment mode is not read here; the mode selector
//! resolves it lazily on first dispatch.

use std::path::PathBuf;
use std::time::Duration;

use provider_sdk::config::{ConfigProvider, ConfigProviderExt};
use provider_sdk::ResilienceConfig;

/// Hard ceiling on a caller-supplied timeout
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub resilience: ResilienceConfig,
    /// Bound on a whole dispatch when the caller gives none
    pub request_timeout: Duration,
    /// JSON-lines audit file; audit goes to the log when unset
    pub audit_log_path: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            resilience: ResilienceConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            audit_log_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let defaults = Self::default();

        Self {
            resilience: ResilienceConfig::from_provider(provider),
            request_timeout: provider
                .get_duration_or("request_timeout", defaults.request_timeout)
                .min(MAX_REQUEST_TIMEOUT),
            audit_log_path: provider.get_opt("audit_log_path").map(PathBuf::from),
            max_body_bytes: provider
                .get::<usize>("max_body_bytes")
                .unwrap_or(defaults.max_body_bytes),
        }
    }

    /// Caller timeout if given, capped; the configured default otherwise
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|t| !t.is_zero())
            .map(|t| t.min(MAX_REQUEST_TIMEOUT))
            .unwrap_or(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_sdk::config::MemoryConfigProvider;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_provider(&MemoryConfigProvider::new());

        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.audit_log_path.is_none());
        assert_eq!(config.resilience.rate_limit_max_requests, 60);
    }

    #[test]
    fn test_overrides() {
        let provider = MemoryConfigProvider::new()
            .with("rate_limit_max_requests", "5")
            .with("rate_limit_window", "10s")
            .with("circuit_failure_threshold", "2")
            .with("circuit_cooldown", "250ms")
            .with("retry_max_attempts", "4")
            .with("request_timeout", "30s")
            .with("audit_log_path", "/var/log/gateway/audit.jsonl");

        let config = GatewayConfig::from_provider(&provider);

        assert_eq!(config.resilience.rate_limit_max_requests, 5);
        assert_eq!(config.resilience.rate_limit_window, Duration::from_secs(10));
        assert_eq!(config.resilience.circuit.failure_threshold, 2);
        assert_eq!(config.resilience.circuit.cooldown, Duration::from_millis(250));
        assert_eq!(config.resilience.retry.max_attempts, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.audit_log_path, Some(PathBuf::from("/var/log/gateway/audit.jsonl")));
    }

    #[test]
    fn test_effective_timeout() {
        let config = GatewayConfig::default();

        assert_eq!(config.effective_timeout(None), Duration::from_secs(120));
        assert_eq!(config.effective_timeout(Some(Duration::ZERO)), Duration::from_secs(120));
        assert_eq!(config.effective_timeout(Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(config.effective_timeout(Some(Duration::from_secs(9000))), MAX_REQUEST_TIMEOUT);
    }
}
