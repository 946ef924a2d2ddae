//! # Action Gateway
//!
//! Uniform action interface over chat, search, browser, runtime and memory
//! providers. A caller submits `{resource, action, parameters}`; the gateway
//! resolves an adapter for the deployment mode, runs it behind rate
//! limiting, circuit breaking and retry, and audits every call.
//!
//! Control flow:
//!
//! caller -> `Dispatcher` -> `ModeSelector` -> `AdapterRegistry` ->
//! `Resilience` -> `ProviderAdapter` -> `Dispatcher` (audit) -> caller

pub mod audit;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod factory;
pub mod logging;
pub mod mode;
pub mod redact;
pub mod registry;
pub mod server;

pub use audit::{AuditEmitter, AuditError, AuditOutcome, AuditRecord, AuditSink};
pub use config::GatewayConfig;
pub use dispatch::{DispatchContext, Dispatcher, ExecutionResult};
pub use envelope::{ActionEnvelope, DispatchResponse};
pub use error::GatewayError;
pub use mode::{AdapterSet, AdapterSetHandle, ConfigAdapterSetLoader, DeploymentMode, ModeSelector};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use server::ActionGateway;
