//! Browser automation adapters
//!
//! Browser sessions belong to the caller: a call without a session token
//! provisions one and returns its id, later calls pass the id back, and only
//! an explicit `close` releases it. A session provisioned by a call that then
//! fails or is cancelled is released right away since the caller never
//! learned its id.

pub mod browserbase;
pub mod webdriver;

pub use browserbase::{normalize_browserbase_result, BrowserbaseAdapter};
pub use webdriver::{normalize_webdriver_value, WebDriverAdapter};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};

use crate::core::AdapterRequest;
use crate::error::{ProviderError, Result};

pub const BROWSER_ACTIONS: &[&str] = &["navigate", "click", "type", "screenshot", "extract", "scrape", "close"];

/// One parsed browser action
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCommand {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    Screenshot { full_page: bool },
    Extract { selector: String },
    Scrape { url: String, wait_for: Option<String>, extract_rules: Option<Value> },
    Close,
}

impl BrowserCommand {
    pub fn from_request(request: &AdapterRequest) -> Result<Self> {
        let command = match request.action.as_str() {
            "navigate" => BrowserCommand::Navigate {
                url: request.require_str("url")?.to_string(),
            },
            "click" => BrowserCommand::Click {
                selector: request.require_str("selector")?.to_string(),
            },
            "type" => BrowserCommand::Type {
                selector: request.require_str("selector")?.to_string(),
                // Typing an empty string is legitimate; only absence is an error
                text: request
                    .param("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProviderError::validation("parameter 'text' is required"))?
                    .to_string(),
            },
            "screenshot" => BrowserCommand::Screenshot {
                full_page: request
                    .opt_bool("fullPage")
                    .or_else(|| request.param("screenshot").and_then(|s| s.get("fullPage")).and_then(Value::as_bool))
                    .unwrap_or(false),
            },
            "extract" => BrowserCommand::Extract {
                selector: request.require_str("selector")?.to_string(),
            },
            "scrape" => BrowserCommand::Scrape {
                url: request.require_str("url")?.to_string(),
                wait_for: request.opt_str("selector").map(str::to_string),
                extract_rules: request.param("extractRules").cloned(),
            },
            "close" => BrowserCommand::Close,
            other => return Err(ProviderError::validation(format!("unsupported browser action '{}'", other))),
        };

        Ok(command)
    }
}

/// Session token: `parameters.browserSessionId`, then the envelope session
pub fn browser_session_token(request: &AdapterRequest) -> Option<String> {
    request
        .opt_str("browserSessionId")
        .map(str::to_string)
        .or_else(|| request.session_id.clone())
}

/// Script returning text, href and src of every element matching `arguments[0]`
pub const EXTRACT_SCRIPT: &str = "const elements = document.querySelectorAll(arguments[0]); \
     return Array.from(elements).map(el => ({ text: el.textContent, href: el.href || null, src: el.src || null }));";

/// Provider-specific session operations
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Create a remote browser session and return its id
    async fn provision(&self) -> Result<String>;

    /// Run one command inside an existing session
    async fn perform(&self, session_id: &str, command: &BrowserCommand) -> Result<Value>;

    /// Release a session. The future owns what it needs so it can run after
    /// the calling future is gone.
    fn release(&self, session_id: &str) -> BoxFuture<'static, Result<()>>;

    /// Commands that run without a browser session (e.g. a scraping API)
    async fn perform_sessionless(&self, _command: &BrowserCommand) -> Option<Result<Value>> {
        None
    }
}

/// Run one browser request: reuse or provision a session, perform the command
pub async fn run_browser_request<B>(backend: &B, request: &AdapterRequest) -> Result<Value>
where
    B: BrowserBackend + ?Sized,
{
    let command = BrowserCommand::from_request(request)?;
    let token = browser_session_token(request);

    if command == BrowserCommand::Close {
        let session_id = token.ok_or_else(|| ProviderError::validation("parameter 'browserSessionId' is required"))?;
        backend.release(&session_id).await?;
        return Ok(json!({ "browserSessionId": session_id, "closed": true }));
    }

    if token.is_none() {
        if let Some(result) = backend.perform_sessionless(&command).await {
            return Ok(json!({ "browserSessionId": Value::Null, "newSession": false, "result": result? }));
        }
    }

    let (session_id, fresh) = match token {
        Some(id) => (id, None),
        None => {
            let id = backend.provision().await?;
            let guard = ProvisionedSession::new(&id, backend.release(&id));
            (id, Some(guard))
        }
    };

    match backend.perform(&session_id, &command).await {
        Ok(result) => {
            let provisioned = fresh.map(ProvisionedSession::keep).is_some();
            Ok(browser_payload(&session_id, provisioned, result))
        }
        Err(err) => {
            if let Some(guard) = fresh {
                if let Err(release_err) = guard.release().await {
                    log::warn!("Failed to release browser session after error: {}", release_err);
                }
            }
            Err(err)
        }
    }
}

/// A session provisioned by the current call
///
/// Released on drop unless `keep` hands it to the caller, so a cancelled
/// call does not strand it.
struct ProvisionedSession {
    session_id: String,
    release: Option<BoxFuture<'static, Result<()>>>,
}

impl ProvisionedSession {
    fn new(session_id: &str, release: BoxFuture<'static, Result<()>>) -> Self {
        Self {
            session_id: session_id.to_string(),
            release: Some(release),
        }
    }

    fn keep(mut self) {
        self.release = None;
    }

    async fn release(mut self) -> Result<()> {
        match self.release.take() {
            Some(release) => release.await,
            None => Ok(()),
        }
    }
}

impl Drop for ProvisionedSession {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        let session_id = std::mem::take(&mut self.session_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match release.await {
                        Ok(()) => log::debug!("Released abandoned browser session {}", session_id),
                        Err(err) => log::warn!("Failed to release abandoned browser session {}: {}", session_id, err),
                    }
                });
            }
            Err(_) => log::error!("No runtime available to release browser session {}", session_id),
        }
    }
}

pub fn browser_payload(session_id: &str, provisioned: bool, result: Value) -> Value {
    let mut payload = Map::new();
    payload.insert("browserSessionId".into(), Value::String(session_id.to_string()));
    payload.insert("newSession".into(), Value::Bool(provisioned));
    payload.insert("result".into(), result);
    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        fail_perform: bool,
        slow_perform: bool,
    }

    #[async_trait]
    impl BrowserBackend for RecordingBackend {
        async fn provision(&self) -> Result<String> {
            self.calls.lock().unwrap().push("provision".into());
            Ok("sess-1".into())
        }

        async fn perform(&self, session_id: &str, _command: &BrowserCommand) -> Result<Value> {
            self.calls.lock().unwrap().push(format!("perform:{}", session_id));
            if self.slow_perform {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail_perform {
                Err(ProviderError::upstream("boom"))
            } else {
                Ok(json!({"ok": true}))
            }
        }

        fn release(&self, session_id: &str) -> BoxFuture<'static, Result<()>> {
            let calls = self.calls.clone();
            let entry = format!("release:{}", session_id);
            Box::pin(async move {
                calls.lock().unwrap().push(entry);
                Ok(())
            })
        }
    }

    fn request(action: &str, params: Value) -> AdapterRequest {
        AdapterRequest::new(action, params.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_provisions_then_reuses() {
        let backend = RecordingBackend::default();

        let first = run_browser_request(&backend, &request("navigate", json!({"url": "https://example.com"})))
            .await
            .unwrap();
        assert_eq!(first["browserSessionId"], "sess-1");
        assert_eq!(first["newSession"], true);

        let second = run_browser_request(
            &backend,
            &request("click", json!({"selector": "#go", "browserSessionId": "sess-1"})),
        )
        .await
        .unwrap();
        assert_eq!(second["newSession"], false);

        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec!["provision", "perform:sess-1", "perform:sess-1"]
        );
    }

    #[tokio::test]
    async fn test_failed_call_releases_fresh_session_only() {
        let backend = RecordingBackend {
            fail_perform: true,
            ..Default::default()
        };

        let _ = run_browser_request(&backend, &request("screenshot", json!({}))).await;
        let _ = run_browser_request(&backend, &request("screenshot", json!({"browserSessionId": "mine"}))).await;

        let calls = backend.calls.lock().unwrap();
        assert!(calls.contains(&"release:sess-1".to_string()));
        assert!(!calls.contains(&"release:mine".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_call_releases_fresh_session() {
        let backend = RecordingBackend {
            slow_perform: true,
            ..Default::default()
        };

        let navigate = request("navigate", json!({"url": "https://example.com"}));
        let outcome = tokio::time::timeout(Duration::from_millis(50), run_browser_request(&backend, &navigate)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backend.calls.lock().unwrap().contains(&"release:sess-1".to_string()));

        // A caller-owned session is never released by cancellation
        let click = request("click", json!({"selector": "#go", "browserSessionId": "mine"}));
        let _ = tokio::time::timeout(Duration::from_millis(50), run_browser_request(&backend, &click)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!backend.calls.lock().unwrap().contains(&"release:mine".to_string()));
    }

    #[tokio::test]
    async fn test_close_requires_token() {
        let backend = RecordingBackend::default();
        assert!(run_browser_request(&backend, &request("close", json!({}))).await.is_err());

        let closed = run_browser_request(&backend, &request("close", json!({"browserSessionId": "s9"})))
            .await
            .unwrap();
        assert_eq!(closed["closed"], true);
    }

    #[test]
    fn test_command_parsing() {
        assert!(BrowserCommand::from_request(&request("type", json!({"selector": "#q"}))).is_err());
        assert_eq!(
            BrowserCommand::from_request(&request("screenshot", json!({"screenshot": {"fullPage": true}}))).unwrap(),
            BrowserCommand::Screenshot { full_page: true }
        );
    }
}
