//! Dispatch core
//!
//! One call: validate the envelope, resolve the adapter through the mode
//! selector, run it behind the resilience policies, then emit exactly one
//! audit record whatever the outcome. The whole chain runs under the
//! caller's timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use provider_sdk::util::generate_request_id;
use provider_sdk::{AdapterRequest, Attempted, ProviderIdentity, Resilience};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::audit::{AuditEmitter, AuditOutcome, AuditRecord};
use crate::catalog;
use crate::config::GatewayConfig;
use crate::envelope::ActionEnvelope;
use crate::error::GatewayError;
use crate::mode::ModeSelector;

/// Outcome of one successful dispatch
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub payload: Value,
    pub provider_identity: ProviderIdentity,
    pub latency_ms: u64,
    pub attempts: u32,
}

/// Per-call inputs that are not part of the envelope
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Key the rate limiter counts against
    pub client_key: String,
    pub timeout: Option<Duration>,
    pub request_id: Option<String>,
}

impl DispatchContext {
    pub fn new(client_key: impl Into<String>) -> Self {
        Self {
            client_key: client_key.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

pub struct Dispatcher {
    modes: Arc<ModeSelector>,
    resilience: Arc<Resilience>,
    audit: AuditEmitter,
    config: GatewayConfig,
}

impl Dispatcher {
    pub fn new(
        modes: Arc<ModeSelector>,
        resilience: Arc<Resilience>,
        audit: AuditEmitter,
        config: GatewayConfig,
    ) -> Self {
        Self {
            modes,
            resilience,
            audit,
            config,
        }
    }

    pub fn modes(&self) -> &Arc<ModeSelector> {
        &self.modes
    }

    pub fn resilience(&self) -> &Arc<Resilience> {
        &self.resilience
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Dispatch a raw JSON body. Bodies that do not parse are still audited.
    pub async fn dispatch_value(&self, raw: Value, ctx: &DispatchContext) -> Result<ExecutionResult, GatewayError> {
        match ActionEnvelope::from_value(raw.clone()) {
            Ok(envelope) => self.dispatch(envelope, ctx).await,
            Err(e) => {
                let envelope = ActionEnvelope::salvage(&raw);
                let request_id = ctx.request_id.clone().unwrap_or_else(generate_request_id);
                self.finish(&request_id, &envelope, None, Instant::now(), Err(e))
            }
        }
    }

    pub async fn dispatch(&self, envelope: ActionEnvelope, ctx: &DispatchContext) -> Result<ExecutionResult, GatewayError> {
        let request_id = ctx.request_id.clone().unwrap_or_else(generate_request_id);
        let span = info_span!(
            "dispatch",
            request_id = %request_id,
            resource = %envelope.resource,
            action = %envelope.action,
        );

        async {
            let started = Instant::now();
            let timeout = self.config.effective_timeout(ctx.timeout);
            let mut identity = None;

            let outcome = match tokio::time::timeout(timeout, self.execute(&envelope, ctx, &mut identity)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(GatewayError::Cancelled(timeout)),
            };

            self.finish(&request_id, &envelope, identity, started, outcome)
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        envelope: &ActionEnvelope,
        ctx: &DispatchContext,
        resolved: &mut Option<ProviderIdentity>,
    ) -> Result<Attempted<Value>, GatewayError> {
        envelope.validate()?;
        let spec = catalog::lookup(&envelope.resource, &envelope.action)?;
        let parameters = envelope.parameters();
        spec.check_required(&parameters)?;

        let handle = self.modes.resolve_adapter_set(spec.resource).await?;
        let provider = handle.provider_name(envelope.provider_hint.as_deref());
        let adapter = handle.adapter(&provider).await?;
        let identity = adapter.identity().clone();
        *resolved = Some(identity.clone());

        if !adapter.supports_action(spec.action) {
            return Err(GatewayError::unknown(format!("{} does not support '{}'", identity, spec.action)));
        }

        let mut request = AdapterRequest::new(spec.action, parameters);
        if let Some(ref session) = envelope.session_id {
            request = request.with_session(session.clone());
        }

        debug!(identity = %identity, idempotent = spec.idempotent, "Invoking adapter");

        let attempted = self
            .resilience
            .execute(&ctx.client_key, &identity, spec.idempotent, || {
                let adapter = adapter.clone();
                let request = request.clone();
                async move { adapter.execute(&request).await }
            })
            .await?;

        Ok(attempted)
    }

    fn finish(
        &self,
        request_id: &str,
        envelope: &ActionEnvelope,
        identity: Option<ProviderIdentity>,
        started: Instant,
        outcome: Result<Attempted<Value>, GatewayError>,
    ) -> Result<ExecutionResult, GatewayError> {
        let latency_ms = started.elapsed().as_millis() as u64;

        let (record_outcome, result) = match (outcome, identity.clone()) {
            (Ok(Attempted { value, attempts }), Some(provider_identity)) => {
                info!(identity = %provider_identity, attempts, latency_ms, "Dispatch succeeded");
                (
                    AuditOutcome::succeeded(attempts, latency_ms),
                    Ok(ExecutionResult {
                        success: true,
                        payload: value,
                        provider_identity,
                        latency_ms,
                        attempts,
                    }),
                )
            }
            (Ok(_), None) => {
                let err = GatewayError::AdapterUnavailable("adapter identity was not resolved".into());
                (AuditOutcome::failed(&err, latency_ms), Err(err))
            }
            (Err(err), _) => {
                if err.is_transient() {
                    warn!(kind = err.kind(), error = %err, latency_ms, "Dispatch failed");
                } else {
                    info!(kind = err.kind(), error = %err, latency_ms, "Dispatch rejected");
                }
                (AuditOutcome::failed(&err, latency_ms), Err(err))
            }
        };

        self.audit
            .emit(AuditRecord::new(request_id, envelope, identity, record_outcome));

        result
    }
}
