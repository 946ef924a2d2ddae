//! Web search adapters
//!
//! Every provider's results are normalized to
//! `{provider, query, answer?, results: [{title, url, snippet}]}`.

pub mod searxng;
pub mod serpapi;
pub mod tavily;

pub use searxng::{normalize_searxng_response, SearxngAdapter};
pub use serpapi::{normalize_serpapi_response, SerpApiAdapter};
pub use tavily::{normalize_tavily_response, TavilyAdapter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::AdapterRequest;
use crate::error::Result;

pub const SEARCH_ACTIONS: &[&str] = &["web"];

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 50;

/// One normalized search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchHit {
    /// Build a hit from a provider object, reading the named fields
    fn from_fields(item: &Value, title: &str, url: &str, snippet: &str) -> Option<Self> {
        let url = item.get(url).and_then(Value::as_str)?.to_string();
        Some(Self {
            title: item.get(title).and_then(Value::as_str).unwrap_or_default().to_string(),
            snippet: item.get(snippet).and_then(Value::as_str).unwrap_or_default().to_string(),
            url,
        })
    }
}

/// Query and result limit from a `web` request
pub fn search_params(request: &AdapterRequest) -> Result<(String, u64)> {
    let query = request.require_str("query")?.to_string();
    let limit = request.opt_u64("limit").unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok((query, limit))
}

/// Common search payload
pub fn search_payload(provider: &str, query: &str, answer: Option<&str>, hits: Vec<SearchHit>) -> Value {
    json!({
        "provider": provider,
        "query": query,
        "answer": answer,
        "results": hits,
    })
}

/// Extract hits from an array field, keeping at most `limit`
fn collect_hits(
    response: &Value,
    array: &str,
    (title, url, snippet): (&str, &str, &str),
    limit: usize,
) -> Vec<SearchHit> {
    response
        .get(array)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| SearchHit::from_fields(item, title, url, snippet))
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_clamps_limit() {
        let request = AdapterRequest::new("web", json!({"query": "rust", "limit": 500}).as_object().cloned().unwrap());
        assert_eq!(search_params(&request).unwrap(), ("rust".to_string(), MAX_LIMIT));

        let request = AdapterRequest::new("web", json!({"query": "rust"}).as_object().cloned().unwrap());
        assert_eq!(search_params(&request).unwrap().1, DEFAULT_LIMIT);
    }

    #[test]
    fn test_hits_without_url_are_skipped() {
        let response = json!({"items": [{"title": "no url"}, {"title": "ok", "link": "https://a.example"}]});
        let hits = collect_hits(&response, "items", ("title", "link", "snippet"), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a.example");
    }
}
