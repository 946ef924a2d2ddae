// action-gateway-rs/src/main.rs
// Action Gateway - HTTP entry point for action envelopes
// Port 8000 by default (GATEWAY_SERVICE_ADDR / GATEWAY_SERVICE_PORT)

use std::sync::Arc;

use action_gateway::audit::{AuditEmitter, AuditSink, JsonlFileAuditSink, TracingAuditSink};
use action_gateway::logging::{init_logging, LogFormat};
use action_gateway::{ActionGateway, ConfigAdapterSetLoader, Dispatcher, GatewayConfig, ModeSelector};
use anyhow::Context;
use provider_sdk::config::{ConfigProvider, DEFAULT_PROVIDER};
use provider_sdk::Resilience;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config_rs::load_env();
    init_logging(LogFormat::from_env()).context("failed to install log subscriber")?;

    let config_provider: Arc<dyn ConfigProvider> = DEFAULT_PROVIDER.clone();
    let config = GatewayConfig::from_provider(config_provider.as_ref());
    tracing::info!(
        rate_limit = config.resilience.rate_limit_max_requests,
        window = ?config.resilience.rate_limit_window,
        circuit_threshold = config.resilience.circuit.failure_threshold,
        retry_attempts = config.resilience.retry.max_attempts,
        "Gateway configuration loaded"
    );

    let sink: Arc<dyn AuditSink> = match config.audit_log_path {
        Some(ref path) => {
            let sink = JsonlFileAuditSink::open(path)
                .await
                .with_context(|| format!("failed to open audit log {}", path.display()))?;
            tracing::info!(path = %path.display(), "Writing audit records to file");
            Arc::new(sink)
        }
        None => Arc::new(TracingAuditSink),
    };
    let (audit, audit_worker) = AuditEmitter::spawn(sink);

    let modes = Arc::new(ModeSelector::new(Arc::new(ConfigAdapterSetLoader::new(
        config_provider.clone(),
    ))));
    let resilience = Arc::new(Resilience::new(config.resilience.clone()));
    let dispatcher = Arc::new(Dispatcher::new(modes, resilience, audit, config));

    let addr = config_rs::get_bind_address("GATEWAY", 8000);
    Arc::new(ActionGateway::new(dispatcher))
        .serve(addr)
        .await
        .context("gateway server failed")?;

    // The dispatcher (and its emitter) is gone once serve returns
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), audit_worker).await;
    tracing::info!("Action gateway stopped");
    Ok(())
}
