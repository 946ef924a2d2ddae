//! Mock tests for the browser adapters

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ProviderCredentials;
    use crate::core::{AdapterRequest, EndpointClass, ProviderAdapter, ProviderIdentity, ResourceKind};
    use crate::services::browser::{BrowserbaseAdapter, WebDriverAdapter};

    fn request(action: &str, params: Value) -> AdapterRequest {
        AdapterRequest::new(action, params.as_object().cloned().unwrap())
    }

    fn browserbase(server: &MockServer, scrapybara: Option<&ProviderCredentials>) -> BrowserbaseAdapter {
        let identity = ProviderIdentity::new(ResourceKind::Browser, "browserbase", EndpointClass::RemoteManaged);
        let creds = ProviderCredentials::new("browserbase", server.uri())
            .with_api_key("bb-mock")
            .with_option("project_id", "proj-1");
        BrowserbaseAdapter::new(identity, &creds, scrapybara).unwrap()
    }

    #[tokio::test]
    async fn test_browserbase_provisions_then_reuses_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(header("X-BB-API-Key", "bb-mock"))
            .and(body_partial_json(json!({"projectId": "proj-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "bb-session-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/sessions/bb-session-1/actions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(2)
            .mount(&mock_server)
            .await;

        let adapter = browserbase(&mock_server, None);

        let navigated = adapter
            .execute(&request("navigate", json!({"url": "https://example.com"})))
            .await
            .unwrap();
        assert_eq!(navigated["browserSessionId"], "bb-session-1");
        assert_eq!(navigated["newSession"], true);

        let clicked = adapter
            .execute(&request("click", json!({"selector": "#submit", "browserSessionId": "bb-session-1"})))
            .await
            .unwrap();
        assert_eq!(clicked["newSession"], false);
    }

    #[tokio::test]
    async fn test_browserbase_cancelled_navigate_releases_new_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "bb-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/sessions/bb-1/actions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ok"}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/sessions/bb-1"))
            .and(body_partial_json(json!({"status": "REQUEST_RELEASE"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bb-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = browserbase(&mock_server, None);
        let navigate = request("navigate", json!({"url": "https://example.com"}));
        let outcome = tokio::time::timeout(Duration::from_millis(200), adapter.execute(&navigate)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let releases = mock_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/sessions/bb-1")
            .count();
        assert_eq!(releases, 1);
    }

    #[tokio::test]
    async fn test_browserbase_close_releases_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sessions/bb-session-9"))
            .and(body_partial_json(json!({"status": "REQUEST_RELEASE"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bb-session-9"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = browserbase(&mock_server, None);
        let closed = adapter
            .execute(&request("close", json!({"browserSessionId": "bb-session-9"})))
            .await
            .unwrap();
        assert_eq!(closed["closed"], true);
    }

    #[tokio::test]
    async fn test_scrape_support_depends_on_scrapybara() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/scrape"))
            .and(header("authorization", "Bearer scrapy-mock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "<h1>Hi</h1>"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(!browserbase(&mock_server, None).supports_action("scrape"));

        let scrapy = ProviderCredentials::new("scrapybara", mock_server.uri()).with_api_key("scrapy-mock");
        let adapter = browserbase(&mock_server, Some(&scrapy));
        assert!(adapter.supports_action("scrape"));

        let scraped = adapter
            .execute(&request("scrape", json!({"url": "https://example.com"})))
            .await
            .unwrap();
        assert_eq!(scraped["result"]["content"], "<h1>Hi</h1>");
        assert!(scraped["browserSessionId"].is_null());
    }

    #[tokio::test]
    async fn test_webdriver_type_into_element() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": {"sessionId": "wd-1", "capabilities": {}}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/session/wd-1/element"))
            .and(body_partial_json(json!({"using": "css selector", "value": "input[name=q]"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": {"element-6066-11e4-a52e-4f735466cecf": "el-42"}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/session/wd-1/element/el-42/value"))
            .and(body_partial_json(json!({"text": "rust"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let identity = ProviderIdentity::new(ResourceKind::Browser, "webdriver", EndpointClass::SelfHosted);
        let adapter = WebDriverAdapter::new(identity, &ProviderCredentials::new("webdriver", mock_server.uri())).unwrap();

        let typed = adapter
            .execute(&request("type", json!({"selector": "input[name=q]", "text": "rust"})))
            .await
            .unwrap();
        assert_eq!(typed["browserSessionId"], "wd-1");
        assert_eq!(typed["result"]["typed"], 4);
    }

    #[tokio::test]
    async fn test_webdriver_missing_element_releases_fresh_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": {"sessionId": "wd-2"}})))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/session/wd-2/element"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": {"error": "no such element", "message": "Unable to locate element"}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/session/wd-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let identity = ProviderIdentity::new(ResourceKind::Browser, "webdriver", EndpointClass::SelfHosted);
        let adapter = WebDriverAdapter::new(identity, &ProviderCredentials::new("webdriver", mock_server.uri())).unwrap();

        let err = adapter
            .execute(&request("click", json!({"selector": "#missing"})))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "not_found");
    }
}
