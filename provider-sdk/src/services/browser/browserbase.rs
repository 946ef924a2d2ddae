//! Browserbase adapter, with scraping through Scrapybara

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use super::{run_browser_request, BrowserBackend, BrowserCommand, BROWSER_ACTIONS, EXTRACT_SCRIPT};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://www.browserbase.com/v1";
pub const SCRAPYBARA_BASE_URL: &str = "https://api.scrapybara.com";

pub struct BrowserbaseAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    project_id: String,
    scrapybara: Option<HttpTransport>,
}

impl BrowserbaseAdapter {
    /// `scrapybara` enables the `scrape` action when its key is configured
    pub fn new(
        identity: ProviderIdentity,
        credentials: &ProviderCredentials,
        scrapybara: Option<&ProviderCredentials>,
    ) -> Result<Self> {
        let transport = ClientBuilder::new("browserbase")
            .base_url(credentials.base_url.as_str())
            .auth(
                AuthScheme::Header("X-BB-API-Key".to_string()),
                Some(credentials.require_api_key()?.to_string()),
            )
            .timeout(credentials.timeout)
            .build()?;

        let scrapybara = match scrapybara.and_then(|c| c.api_key.as_ref().map(|key| (c, key))) {
            Some((creds, key)) => Some(
                ClientBuilder::new("scrapybara")
                    .base_url(creds.base_url.as_str())
                    .auth(AuthScheme::Bearer, Some(key.clone()))
                    .timeout(creds.timeout)
                    .build()?,
            ),
            None => None,
        };

        Ok(Self {
            identity,
            transport,
            project_id: credentials.require_option("project_id")?.to_string(),
            scrapybara,
        })
    }

    async fn action(&self, session_id: &str, body: Value) -> Result<Value> {
        self.transport
            .post_json(&format!("sessions/{}/actions", session_id), &body)
            .await
    }

    async fn scrape(&self, command: &BrowserCommand) -> Result<Value> {
        let BrowserCommand::Scrape { url, wait_for, extract_rules } = command else {
            return Err(ProviderError::internal("scrape called with a non-scrape command"));
        };
        let scrapybara = self
            .scrapybara
            .as_ref()
            .ok_or_else(|| ProviderError::configuration("scrapybara API key is not configured"))?;

        let body = json!({ "url": url, "wait_for": wait_for, "extract_rules": extract_rules });
        scrapybara.post_json("scrape", &body).await
    }
}

#[async_trait]
impl BrowserBackend for BrowserbaseAdapter {
    async fn provision(&self) -> Result<String> {
        let body = json!({
            "projectId": self.project_id,
            "browserSettings": { "viewport": { "width": 1920, "height": 1080 } },
        });

        let response = self.transport.post_json("sessions", &body).await?;
        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::parsing("browserbase session response has no id"))
    }

    async fn perform(&self, session_id: &str, command: &BrowserCommand) -> Result<Value> {
        let body = match command {
            BrowserCommand::Navigate { url } => json!({ "type": "navigate", "url": url }),
            BrowserCommand::Click { selector } => json!({ "type": "click", "selector": selector }),
            BrowserCommand::Type { selector, text } => json!({ "type": "type", "selector": selector, "text": text }),
            BrowserCommand::Screenshot { full_page } => json!({ "type": "screenshot", "fullPage": full_page }),
            BrowserCommand::Extract { selector } => {
                json!({ "type": "evaluate", "script": EXTRACT_SCRIPT, "args": [selector] })
            }
            BrowserCommand::Scrape { .. } => return self.scrape(command).await,
            BrowserCommand::Close => return Err(ProviderError::internal("close is not a session action")),
        };

        let response = self.action(session_id, body).await?;
        Ok(normalize_browserbase_result(command, response))
    }

    fn release(&self, session_id: &str) -> BoxFuture<'static, Result<()>> {
        let transport = self.transport.clone();
        let endpoint = format!("sessions/{}", session_id);
        let body = json!({ "projectId": self.project_id, "status": "REQUEST_RELEASE" });

        Box::pin(async move { transport.post_json(&endpoint, &body).await.map(|_| ()) })
    }

    async fn perform_sessionless(&self, command: &BrowserCommand) -> Option<Result<Value>> {
        match command {
            BrowserCommand::Scrape { .. } => Some(self.scrape(command).await),
            _ => None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for BrowserbaseAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::ScopedByCaller
    }

    fn supports_action(&self, action: &str) -> bool {
        match action {
            "scrape" => self.scrapybara.is_some(),
            other => BROWSER_ACTIONS.contains(&other),
        }
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        run_browser_request(self, request).await
    }
}

/// Normalize a Browserbase action response
pub fn normalize_browserbase_result(command: &BrowserCommand, response: Value) -> Value {
    match command {
        BrowserCommand::Screenshot { .. } => {
            let image = response
                .get("screenshot")
                .or_else(|| response.get("data"))
                .cloned()
                .unwrap_or(response);
            json!({ "image": image, "encoding": "base64" })
        }
        BrowserCommand::Extract { .. } => {
            let items = response
                .get("result")
                .cloned()
                .unwrap_or(response);
            json!({ "elements": items })
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_screenshot() {
        let payload = normalize_browserbase_result(
            &BrowserCommand::Screenshot { full_page: false },
            json!({"screenshot": "iVBORw0"}),
        );
        assert_eq!(payload["image"], "iVBORw0");
    }

    #[test]
    fn test_missing_project_id_is_configuration_error() {
        let identity = ProviderIdentity::new(
            crate::core::ResourceKind::Browser,
            "browserbase",
            crate::core::EndpointClass::RemoteManaged,
        );
        let creds = ProviderCredentials::new("browserbase", DEFAULT_BASE_URL).with_api_key("bb_key");

        let err = BrowserbaseAdapter::new(identity, &creds, None).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
