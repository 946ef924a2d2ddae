//! Client builder implementation
//!
//! Provides a unified builder for the HTTP transport every remote adapter
//! uses: base URL, credentials, timeout and default headers.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as ReqwestClient;
use url::Url;

use crate::error::{ProviderError, Result};
use crate::services::common::{HttpTransport, UserAgent};

/// How a provider expects its credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// No credential
    None,
    /// `Authorization: Bearer <token>`
    Bearer,
    /// Raw token in a named header (e.g. `x-api-key`)
    Header(String),
    /// Token as a query parameter (e.g. `api_key`)
    QueryParam(String),
}

/// Unified client builder for provider transports
pub struct ClientBuilder {
    /// Provider name, used in error context and logs
    service: String,

    /// Base URL for the provider
    base_url: Option<String>,

    /// Authentication token or key
    auth_token: Option<String>,

    /// Where the token goes
    auth_scheme: AuthScheme,

    /// Custom headers to include with all requests
    custom_headers: HashMap<String, String>,

    /// Request timeout
    timeout: Option<Duration>,

    /// User agent
    user_agent: UserAgent,

    /// Enable response compression
    compression: bool,
}

impl ClientBuilder {
    /// Create a new client builder for the named provider
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            user_agent: UserAgent::for_client(&service),
            service,
            base_url: None,
            auth_token: None,
            auth_scheme: AuthScheme::None,
            custom_headers: HashMap::new(),
            timeout: Some(Duration::from_secs(30)),
            compression: true,
        }
    }

    /// Set the base URL for the provider
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential and how it is sent
    pub fn auth(mut self, scheme: AuthScheme, token: Option<String>) -> Self {
        self.auth_scheme = scheme;
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Add a custom header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Build the underlying reqwest client with the configured settings
    pub fn build_http_client(&self) -> Result<ReqwestClient> {
        let mut builder = ReqwestClient::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder = builder
            .user_agent(self.user_agent.to_string())
            .gzip(self.compression);

        let mut headers = HeaderMap::new();
        for (key, value) in &self.custom_headers {
            let header_name = HeaderName::from_str(key)
                .map_err(|e| ProviderError::configuration(format!("Invalid header name: {}", e)))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ProviderError::configuration(format!("Invalid value for header {}", key))
            })?;
            headers.insert(header_name, header_value);
        }

        if let Some(ref token) = self.auth_token {
            match &self.auth_scheme {
                AuthScheme::Bearer => {
                    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                        ProviderError::configuration(format!("Invalid credential format for {}", self.service))
                    })?;
                    value.set_sensitive(true);
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                AuthScheme::Header(name) => {
                    let header_name = HeaderName::from_str(name).map_err(|e| {
                        ProviderError::configuration(format!("Invalid auth header name: {}", e))
                    })?;
                    let mut value = HeaderValue::from_str(token).map_err(|_| {
                        ProviderError::configuration(format!("Invalid credential format for {}", self.service))
                    })?;
                    value.set_sensitive(true);
                    headers.insert(header_name, value);
                }
                AuthScheme::QueryParam(_) | AuthScheme::None => {}
            }
        }

        builder = builder.default_headers(headers);

        builder
            .build()
            .map_err(|_| ProviderError::configuration(format!("Failed to build HTTP client for {}", self.service)))
    }

    /// Build the transport adapters use to talk to the provider
    pub fn build(self) -> Result<HttpTransport> {
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| ProviderError::configuration(format!("{} base URL is required", self.service)))?;

        Url::parse(&base_url)
            .map_err(|_| ProviderError::configuration(format!("{} base URL is not a valid URL", self.service)))?;

        let client = self.build_http_client()?;

        let query_auth = match (&self.auth_scheme, &self.auth_token) {
            (AuthScheme::QueryParam(name), Some(token)) => Some((name.clone(), token.clone())),
            _ => None,
        };

        Ok(HttpTransport::new(client, self.service, base_url, query_auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_base_url() {
        let err = ClientBuilder::new("tavily").build().err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = ClientBuilder::new("mem0").base_url("not a url").build().err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_invalid_credential_is_not_echoed() {
        let err = ClientBuilder::new("openai")
            .base_url("https://api.openai.com/v1")
            .auth(AuthScheme::Bearer, Some("secret\nvalue".to_string()))
            .build()
            .err()
            .unwrap();

        assert!(!err.to_string().contains("secret"));
    }
}
