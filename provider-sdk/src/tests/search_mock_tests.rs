//! Mock tests for the search adapters

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ProviderCredentials;
    use crate::core::{AdapterRequest, EndpointClass, ProviderAdapter, ProviderIdentity, ResourceKind};
    use crate::error::ProviderError;
    use crate::services::search::{SearxngAdapter, SerpApiAdapter, TavilyAdapter};

    fn identity(name: &str, class: EndpointClass) -> ProviderIdentity {
        ProviderIdentity::new(ResourceKind::Search, name, class)
    }

    fn web(query: &str) -> AdapterRequest {
        AdapterRequest::new("web", json!({"query": query, "limit": 2}).as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_tavily_search() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-mock"))
            .and(body_partial_json(json!({"query": "rust async", "max_results": 2, "include_answer": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Use tokio",
                "results": [
                    {"title": "Tokio", "url": "https://tokio.rs", "content": "An async runtime"},
                    {"title": "async-std", "url": "https://async.rs", "content": "Another runtime"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let creds = ProviderCredentials::new("tavily", mock_server.uri()).with_api_key("tvly-mock");
        let adapter = TavilyAdapter::new(identity("tavily", EndpointClass::RemoteManaged), &creds).unwrap();

        let payload = adapter.execute(&web("rust async")).await.unwrap();
        assert_eq!(payload["provider"], "tavily");
        assert_eq!(payload["answer"], "Use tokio");
        assert_eq!(payload["results"].as_array().unwrap().len(), 2);
        assert_eq!(payload["results"][0]["url"], "https://tokio.rs");
    }

    #[tokio::test]
    async fn test_serpapi_sends_key_as_query_param() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("api_key", "serp-mock"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [{"title": "Rust", "link": "https://www.rust-lang.org", "snippet": "Fast"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let creds = ProviderCredentials::new("serpapi", mock_server.uri()).with_api_key("serp-mock");
        let adapter = SerpApiAdapter::new(identity("serpapi", EndpointClass::RemoteManaged), &creds).unwrap();

        let payload = adapter.execute(&web("rust")).await.unwrap();
        assert_eq!(payload["results"][0]["title"], "Rust");
    }

    #[tokio::test]
    async fn test_serpapi_auth_error_is_permanent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key."})))
            .mount(&mock_server)
            .await;

        let creds = ProviderCredentials::new("serpapi", mock_server.uri()).with_api_key("serp-secret");
        let adapter = SerpApiAdapter::new(identity("serpapi", EndpointClass::RemoteManaged), &creds).unwrap();

        let err = adapter.execute(&web("rust")).await.unwrap_err();
        assert!(matches!(err.root(), ProviderError::Authentication(_)));
        assert!(err.is_permanent());
        assert_eq!(err.status_code(), Some(401));
    }

    #[tokio::test]
    async fn test_searxng_upstream_error_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let creds = ProviderCredentials::new("searxng", mock_server.uri());
        let adapter = SearxngAdapter::new(identity("searxng", EndpointClass::SelfHosted), &creds).unwrap();

        let err = adapter.execute(&web("rust")).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.category(), "upstream");
    }

    #[tokio::test]
    async fn test_missing_query_makes_no_request() {
        let mock_server = MockServer::start().await;

        let creds = ProviderCredentials::new("searxng", mock_server.uri());
        let adapter = SearxngAdapter::new(identity("searxng", EndpointClass::SelfHosted), &creds).unwrap();

        let request = AdapterRequest::new("web", serde_json::Map::<String, Value>::new());
        let err = adapter.execute(&request).await.unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }
}
