//! E2B sandbox adapter

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use super::{execution_payload, ExecutionSpec, RUNTIME_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.e2b.dev";
const DEFAULT_TEMPLATE: &str = "base";
const SANDBOX_TIMEOUT: Duration = Duration::from_secs(60);

pub struct E2bAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    template: String,
}

impl E2bAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("e2b")
            .base_url(credentials.base_url.as_str())
            .auth(
                AuthScheme::Header("X-API-Key".to_string()),
                Some(credentials.require_api_key()?.to_string()),
            )
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            identity,
            transport,
            template: credentials.option("template").unwrap_or(DEFAULT_TEMPLATE).to_string(),
        })
    }

    /// Provisioning runs on its own task so a sandbox created after the
    /// caller gave up is still torn down.
    async fn provision(&self) -> Result<SandboxLease> {
        let transport = self.transport.clone();
        let body = json!({ "templateID": self.template, "timeout": SANDBOX_TIMEOUT.as_secs() });
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let provisioned = create_sandbox(&transport, &body).await;
            if let Err(Ok(orphan)) = tx.send(provisioned) {
                log::warn!("Caller went away during provisioning, tearing down e2b sandbox {}", orphan.sandbox_id());
                if let Err(err) = orphan.release().await {
                    log::warn!("Failed to tear down orphaned e2b sandbox: {}", err);
                }
            }
        });

        rx.await
            .map_err(|_| ProviderError::internal("e2b provisioning task ended without a result"))?
    }

    async fn run(&self, lease: &SandboxLease, spec: &ExecutionSpec) -> Result<Value> {
        for file in &spec.files {
            self.transport
                .post_json(
                    &format!("sandboxes/{}/files", lease.sandbox_id()),
                    &json!({ "path": file.path, "content": file.content }),
                )
                .await?;
        }

        let (cmd, flag) = spec.language.command();
        let response = self
            .transport
            .post_json(
                &format!("sandboxes/{}/process", lease.sandbox_id()),
                &json!({ "cmd": cmd, "args": [flag, spec.code] }),
            )
            .await?;

        Ok(normalize_process_result(&response))
    }
}

#[async_trait]
impl ProviderAdapter for E2bAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::ScopedPerCall
    }

    fn supports_action(&self, action: &str) -> bool {
        RUNTIME_ACTIONS.contains(&action)
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        let spec = ExecutionSpec::from_request(request)?;
        let lease = self.provision().await?;

        let result = self.run(&lease, &spec).await;

        if let Err(err) = lease.release().await {
            log::warn!("Failed to tear down e2b sandbox: {}", err);
        }

        result
    }
}

async fn create_sandbox(transport: &HttpTransport, body: &Value) -> Result<SandboxLease> {
    let response = transport.post_json("sandboxes", body).await?;

    let sandbox_id = response
        .get("sandboxID")
        .or_else(|| response.get("sandboxId"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::parsing("e2b sandbox response has no sandboxID"))?;

    log::debug!("Provisioned e2b sandbox {}", sandbox_id);
    Ok(SandboxLease::new(transport.clone(), sandbox_id.to_string()))
}

/// A provisioned sandbox, torn down when released or dropped
///
/// `release` tears down inline. If the lease is dropped without it (the
/// calling future was cancelled), teardown is spawned on the runtime.
pub struct SandboxLease {
    transport: HttpTransport,
    sandbox_id: String,
    released: bool,
}

impl SandboxLease {
    pub fn new(transport: HttpTransport, sandbox_id: String) -> Self {
        Self {
            transport,
            sandbox_id,
            released: false,
        }
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.transport
            .delete(&format!("sandboxes/{}", self.sandbox_id))
            .await
            .map(|_| ())
    }
}

impl Drop for SandboxLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let transport = self.transport.clone();
        let sandbox_id = std::mem::take(&mut self.sandbox_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = transport.delete(&format!("sandboxes/{}", sandbox_id)).await {
                        log::warn!("Deferred teardown of e2b sandbox {} failed: {}", sandbox_id, err);
                    }
                });
            }
            Err(_) => log::error!("No runtime available to tear down e2b sandbox {}", sandbox_id),
        }
    }
}

/// Normalize an E2B process result
pub fn normalize_process_result(response: &Value) -> Value {
    execution_payload(
        response.get("stdout").and_then(Value::as_str).unwrap_or_default(),
        response.get("stderr").and_then(Value::as_str).unwrap_or_default(),
        response
            .get("exitCode")
            .or_else(|| response.get("exit_code"))
            .and_then(Value::as_i64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_process_result() {
        let payload = normalize_process_result(&json!({"stdout": "hi\n", "stderr": "", "exitCode": 0}));
        assert_eq!(payload, json!({"output": "hi\n", "error": "", "exitCode": 0}));
    }

    #[test]
    fn test_missing_key_never_provisions() {
        let identity = ProviderIdentity::new(
            crate::core::ResourceKind::Runtime,
            "e2b",
            crate::core::EndpointClass::RemoteManaged,
        );
        let creds = ProviderCredentials::new("e2b", DEFAULT_BASE_URL);

        let err = E2bAdapter::new(identity, &creds).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
