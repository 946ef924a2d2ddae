//! SerpAPI search adapter (Google engine)

use async_trait::async_trait;
use serde_json::Value;

use super::{collect_hits, search_params, search_payload, SEARCH_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://serpapi.com";

pub struct SerpApiAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    engine: String,
}

impl SerpApiAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("serpapi")
            .base_url(credentials.base_url.as_str())
            .auth(
                AuthScheme::QueryParam("api_key".to_string()),
                Some(credentials.require_api_key()?.to_string()),
            )
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            identity,
            transport,
            engine: credentials.option("engine").unwrap_or("google").to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for SerpApiAdapter {
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
        let params = [
            ("engine", self.engine.clone()),
            ("q", query.clone()),
            ("num", limit.to_string()),
        ];

        let response = self.transport.get_json("search", &params).await?;

        // SerpAPI reports some failures with a 200 and an error field
        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(ProviderError::service(crate::util::truncate_string(error, 200)));
        }

        Ok(normalize_serpapi_response(&query, limit as usize, &response))
    }
}

pub fn normalize_serpapi_response(query: &str, limit: usize, response: &Value) -> Value {
    let hits = collect_hits(response, "organic_results", ("title", "link", "snippet"), limit);
    let answer = response
        .pointer("/answer_box/answer")
        .or_else(|| response.pointer("/answer_box/snippet"))
        .and_then(Value::as_str);
    search_payload("serpapi", query, answer, hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_serpapi_response() {
        let response = json!({
            "answer_box": {"snippet": "42"},
            "organic_results": [
                {"position": 1, "title": "Answer", "link": "https://example.com", "snippet": "The answer"}
            ]
        });

        let payload = normalize_serpapi_response("meaning of life", 10, &response);
        assert_eq!(payload["answer"], "42");
        assert_eq!(payload["results"][0]["url"], "https://example.com");
    }
}
