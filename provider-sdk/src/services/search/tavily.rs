//! Tavily search adapter

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{collect_hits, search_params, search_payload, SEARCH_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

pub struct TavilyAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
}

impl TavilyAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("tavily")
            .base_url(credentials.base_url.as_str())
            .auth(AuthScheme::Bearer, Some(credentials.require_api_key()?.to_string()))
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self { identity, transport })
    }
}

#[async_trait]
impl ProviderAdapter for TavilyAdapter {
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
        let body = json!({
            "query": query,
            "search_depth": request.opt_str("depth").unwrap_or("advanced"),
            "include_answer": true,
            "max_results": limit,
        });

        let response = self.transport.post_json("search", &body).await?;
        Ok(normalize_tavily_response(&query, limit as usize, &response))
    }
}

pub fn normalize_tavily_response(query: &str, limit: usize, response: &Value) -> Value {
    let hits = collect_hits(response, "results", ("title", "url", "content"), limit);
    let answer = response.get("answer").and_then(Value::as_str).filter(|a| !a.is_empty());
    search_payload("tavily", query, answer, hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tavily_response() {
        let response = json!({
            "answer": "Rust is a language",
            "results": [
                {"title": "Rust", "url": "https://www.rust-lang.org", "content": "A language", "score": 0.9},
                {"title": "Book", "url": "https://doc.rust-lang.org/book", "content": "The book"}
            ]
        });

        let payload = normalize_tavily_response("rust", 1, &response);
        assert_eq!(payload["provider"], "tavily");
        assert_eq!(payload["answer"], "Rust is a language");
        assert_eq!(payload["results"].as_array().unwrap().len(), 1);
        assert_eq!(payload["results"][0]["snippet"], "A language");
    }
}
