//! Common utilities for provider adapters
//!
//! Shared HTTP transport, user agent and error-response parsing.

use std::fmt;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::error::{ErrorContext, ProviderError, Result};

/// UserAgent structure for identifying the gateway to upstream providers
#[derive(Debug, Clone)]
pub struct UserAgent {
    /// Application name
    pub app_name: String,

    /// Version string
    pub version: String,

    /// Optional extra info
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "Action-Gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("provider-sdk".to_string()),
        }
    }
}

impl UserAgent {
    pub fn for_client(client: &str) -> Self {
        Self {
            extra: Some(format!("{}-client", client)),
            ..Self::default()
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// JSON-over-HTTP transport bound to one provider
///
/// Cheap to clone; the reqwest client is reference counted.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    service: String,
    base_url: String,
    query_auth: Option<(String, String)>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub(crate) fn new(
        client: Client,
        service: String,
        base_url: String,
        query_auth: Option<(String, String)>,
    ) -> Self {
        Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            query_auth,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint against the base URL; absolute URLs pass through
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    pub async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        let request = self.client.get(self.url(endpoint)).query(query);
        self.send(request, endpoint).await
    }

    pub async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(request, endpoint).await
    }

    pub async fn put_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let request = self.client.put(self.url(endpoint)).json(body);
        self.send(request, endpoint).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        let request = self.client.delete(self.url(endpoint));
        self.send(request, endpoint).await
    }

    async fn send(&self, mut request: RequestBuilder, endpoint: &str) -> Result<Value> {
        if let Some((ref name, ref token)) = self.query_auth {
            request = request.query(&[(name.as_str(), token.as_str())]);
        }

        log::debug!("{} -> {}", self.service, endpoint);

        let response = request.send().await.map_err(|e| {
            ProviderError::from(e)
                .with_context(ErrorContext::for_service(self.service.as_str()).endpoint(endpoint))
        })?;

        if !response.status().is_success() {
            return Err(parse_error_response(&self.service, endpoint, response).await);
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::from(e)
                .with_context(ErrorContext::for_service(self.service.as_str()).endpoint(endpoint))
        })?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::parsing(format!("{} returned invalid JSON: {}", self.service, e))
                .with_context(ErrorContext::for_service(self.service.as_str()).endpoint(endpoint))
        })
    }
}

/// Create error context for HTTP requests
pub fn create_error_context(service_name: &str, status: Option<reqwest::StatusCode>) -> ErrorContext {
    let mut context = ErrorContext::for_service(service_name);

    if let Some(status_code) = status {
        context = context.status_code(status_code.as_u16());
    }

    context
}

/// Parse error response from HTTP response
pub async fn parse_error_response(service_name: &str, endpoint: &str, response: Response) -> ProviderError {
    let status = response.status();
    let mut context = create_error_context(service_name, Some(status)).endpoint(endpoint);

    let body = response.text().await.unwrap_or_default();

    let error = crate::error::mapping::map_http_error(status, &body, &mut context);
    log::debug!("{} {} failed with {}: {}", service_name, endpoint, status, error);
    error.with_context(context)
}
