//! W3C WebDriver adapter for a self-hosted browser (chromedriver, geckodriver, Selenium)

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use super::{run_browser_request, BrowserBackend, BrowserCommand, BROWSER_ACTIONS, EXTRACT_SCRIPT};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4444";

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub struct WebDriverAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    browser_name: String,
}

impl WebDriverAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("webdriver")
            .base_url(credentials.base_url.as_str())
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            identity,
            transport,
            browser_name: credentials.option("browser").unwrap_or("chrome").to_string(),
        })
    }

    async fn find_element(&self, session_id: &str, selector: &str) -> Result<String> {
        let response = self
            .transport
            .post_json(
                &format!("session/{}/element", session_id),
                &json!({ "using": "css selector", "value": selector }),
            )
            .await?;

        response
            .pointer(&format!("/value/{}", ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::not_found(format!("no element matches '{}'", selector)))
    }

    async fn navigate(&self, session_id: &str, url: &str) -> Result<()> {
        self.transport
            .post_json(&format!("session/{}/url", session_id), &json!({ "url": url }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserBackend for WebDriverAdapter {
    async fn provision(&self) -> Result<String> {
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": self.browser_name,
                    "goog:chromeOptions": { "args": ["--headless=new", "--window-size=1920,1080"] },
                    "moz:firefoxOptions": { "args": ["-headless"] },
                }
            }
        });

        let response = self.transport.post_json("session", &body).await?;
        response
            .pointer("/value/sessionId")
            .or_else(|| response.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::parsing("webdriver new session response has no sessionId"))
    }

    async fn perform(&self, session_id: &str, command: &BrowserCommand) -> Result<Value> {
        match command {
            BrowserCommand::Navigate { url } => {
                self.navigate(session_id, url).await?;
                Ok(json!({ "url": url }))
            }
            BrowserCommand::Click { selector } => {
                let element = self.find_element(session_id, selector).await?;
                self.transport
                    .post_json(&format!("session/{}/element/{}/click", session_id, element), &json!({}))
                    .await?;
                Ok(json!({ "clicked": selector }))
            }
            BrowserCommand::Type { selector, text } => {
                let element = self.find_element(session_id, selector).await?;
                self.transport
                    .post_json(
                        &format!("session/{}/element/{}/value", session_id, element),
                        &json!({ "text": text }),
                    )
                    .await?;
                Ok(json!({ "typed": text.chars().count(), "selector": selector }))
            }
            BrowserCommand::Screenshot { .. } => {
                let response = self
                    .transport
                    .get_json(&format!("session/{}/screenshot", session_id), &[])
                    .await?;
                Ok(json!({ "image": normalize_webdriver_value(response), "encoding": "base64" }))
            }
            BrowserCommand::Extract { selector } => {
                let response = self
                    .transport
                    .post_json(
                        &format!("session/{}/execute/sync", session_id),
                        &json!({ "script": EXTRACT_SCRIPT, "args": [selector] }),
                    )
                    .await?;
                Ok(json!({ "elements": normalize_webdriver_value(response) }))
            }
            BrowserCommand::Scrape { url, .. } => {
                self.navigate(session_id, url).await?;
                let response = self
                    .transport
                    .get_json(&format!("session/{}/source", session_id), &[])
                    .await?;
                Ok(json!({ "url": url, "html": normalize_webdriver_value(response) }))
            }
            BrowserCommand::Close => Err(ProviderError::internal("close is not a session action")),
        }
    }

    fn release(&self, session_id: &str) -> BoxFuture<'static, Result<()>> {
        let transport = self.transport.clone();
        let endpoint = format!("session/{}", session_id);

        Box::pin(async move { transport.delete(&endpoint).await.map(|_| ()) })
    }
}

#[async_trait]
impl ProviderAdapter for WebDriverAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::ScopedByCaller
    }

    fn supports_action(&self, action: &str) -> bool {
        BROWSER_ACTIONS.contains(&action)
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        run_browser_request(self, request).await
    }
}

/// WebDriver wraps every result in `{"value": ...}`
pub fn normalize_webdriver_value(response: Value) -> Value {
    match response {
        Value::Object(mut map) if map.contains_key("value") => map.remove("value").unwrap_or(Value::Null),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_webdriver_value() {
        assert_eq!(normalize_webdriver_value(json!({"value": "abc"})), json!("abc"));
        assert_eq!(normalize_webdriver_value(json!({"value": null})), Value::Null);
        assert_eq!(normalize_webdriver_value(json!([1, 2])), json!([1, 2]));
    }
}
