//! Shared fixtures for gateway end-to-end tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use action_gateway::audit::{AuditEmitter, MemoryAuditSink};
use action_gateway::{ConfigAdapterSetLoader, DispatchContext, Dispatcher, GatewayConfig, ModeSelector};
use provider_sdk::config::MemoryConfigProvider;
use provider_sdk::Resilience;

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub audit: Arc<MemoryAuditSink>,
}

/// Dispatcher wired exactly as the binary wires it, over an in-memory config
pub fn harness(config: MemoryConfigProvider) -> Harness {
    let config = Arc::new(config);
    let gateway_config = GatewayConfig::from_provider(config.as_ref());

    let audit = Arc::new(MemoryAuditSink::new());
    let (emitter, _worker) = AuditEmitter::spawn(audit.clone());

    let modes = Arc::new(ModeSelector::new(Arc::new(ConfigAdapterSetLoader::new(config))));
    let resilience = Arc::new(Resilience::new(gateway_config.resilience.clone()));

    Harness {
        dispatcher: Arc::new(Dispatcher::new(modes, resilience, emitter, gateway_config)),
        audit,
    }
}

pub fn ctx(client: &str) -> DispatchContext {
    DispatchContext::new(client)
}

/// Fast retries so tests do not sleep for real backoff intervals
pub fn fast_remote() -> MemoryConfigProvider {
    MemoryConfigProvider::new()
        .with("deployment_mode", "remote-managed")
        .with("retry_base_delay", "5ms")
        .with("retry_max_delay", "20ms")
}

pub async fn wait_for_audits(sink: &MemoryAuditSink, expected: usize) {
    for _ in 0..100 {
        if sink.len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} audit records, saw {}", expected, sink.len());
}
