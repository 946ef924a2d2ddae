//! Configuration management for provider adapters
//!
//! Values come from layered providers (environment, in-memory) so the
//! gateway can be configured from the process environment in production
//! and from fixed maps in tests.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::{ProviderError, Result};
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ProviderError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ProviderError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Durations accept "250ms", "30s", "5m", "1h" or bare seconds
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value)
            .ok_or_else(|| ProviderError::configuration(format!("Invalid duration for key {}: {}", key, value)))
    }

    /// Typed value parsed from its string form
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: fmt::Display,
    {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ProviderError::configuration(format!("Invalid value for key {}: {}", key, e)))
    }

    fn get_opt(&self, key: &str) -> Option<String> {
        self.get_string(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_opt(key).unwrap_or_else(|| default.to_string())
    }

    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

impl<T: ConfigProvider + ?Sized> ConfigProvider for Arc<T> {
    fn get_string(&self, key: &str) -> Result<String> {
        (**self).get_string(key)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProvider for Box<T> {
    fn get_string(&self, key: &str) -> Result<String> {
        (**self).get_string(key)
    }
}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "TAVILY", "E2B")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ProviderError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => {
                ProviderError::configuration(format!("Environment variable is not valid unicode: {}", env_key))
            }
        })
    }
}

/// In-memory config provider for tests or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }

    /// Builder-style `set`
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.set(key, value);
        self
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Tries multiple providers in order; the first hit wins
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider<P: ConfigProvider + 'static>(&mut self, provider: P) {
        self.providers.push(Box::new(provider));
    }

    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.add_provider(provider);
        self
    }
}

impl fmt::Debug for CompositeConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeConfigProvider")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                ProviderError::configuration(format!("Configuration key not found in any provider: {}", key))
            })
    }
}

/// Global default configuration provider (`GATEWAY_*` environment variables)
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("GATEWAY")));

/// Trait for provider-specific configuration
pub trait ServiceConfig: fmt::Debug + Send + Sync {
    fn validate(&self) -> Result<()>;

    fn service_name(&self) -> &str;
}

/// Credentials and endpoint settings for one upstream provider
///
/// Loaded from `<name>_api_key`, `<name>_base_url`, `<name>_timeout_seconds`
/// and any provider-specific `<name>_<option>` keys.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub options: HashMap<String, String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderCredentials {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            options: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Load credentials for `name` with a default base URL
    pub fn from_provider<P>(provider: &P, name: &str, default_base_url: &str, options: &[&str]) -> Self
    where
        P: ConfigProvider + ?Sized,
    {
        let api_key = provider.get_opt(&format!("{}_api_key", name));
        let base_url = provider.get_string_or(&format!("{}_base_url", name), default_base_url);
        let timeout_seconds = provider.get_int_or(&format!("{}_timeout_seconds", name), 30).max(1) as u64;

        let options = options
            .iter()
            .filter_map(|option| {
                provider
                    .get_opt(&format!("{}_{}", name, option))
                    .map(|value| (option.to_string(), value))
            })
            .collect();

        Self {
            name: name.to_string(),
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_seconds),
            options,
        }
    }

    /// The API key, or a configuration error naming the provider
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::configuration(format!("{} API key is not configured", self.name)))
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn require_option(&self, key: &str) -> Result<&str> {
        self.option(key)
            .ok_or_else(|| ProviderError::configuration(format!("{} {} is not configured", self.name, key)))
    }
}

impl ServiceConfig for ProviderCredentials {
    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ProviderError::configuration(format!("{} base URL is required", self.name)));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        &self.name
    }
}
