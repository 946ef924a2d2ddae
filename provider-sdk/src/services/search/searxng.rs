//! SearxNG adapter for a self-hosted metasearch instance

use async_trait::async_trait;
use serde_json::Value;

use super::{collect_hits, search_params, search_payload, SEARCH_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";

pub struct SearxngAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
}

impl SearxngAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("searxng")
            .base_url(credentials.base_url.as_str())
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self { identity, transport })
    }
}

#[async_trait]
impl ProviderAdapter for SearxngAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::Stateless
    }

    fn supports_action(&self, action: &str) -> bool {
        SEARCH_ACTIONS.contains(&action)
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        if request.action != "web" {
            return Err(ProviderError::validation(format!("unsupported search action '{}'", request.action)));
        }

        let (query, limit) = search_params(request)?;
        let params = [("q", query.clone()), ("format", "json".to_string())];

        let response = self.transport.get_json("search", &params).await?;
        Ok(normalize_searxng_response(&query, limit as usize, &response))
    }
}

pub fn normalize_searxng_response(query: &str, limit: usize, response: &Value) -> Value {
    let hits = collect_hits(response, "results", ("title", "url", "content"), limit);
    let answer = response
        .get("answers")
        .and_then(Value::as_array)
        .and_then(|answers| answers.first())
        .and_then(|a| a.as_str().or_else(|| a.get("answer").and_then(Value::as_str)));
    search_payload("searxng", query, answer, hits)
}
