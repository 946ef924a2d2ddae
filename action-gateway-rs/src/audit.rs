//! Audit records and sinks
//!
//! The dispatcher hands every record to an `AuditEmitter`, which queues it
//! for a background worker. Sink failures are logged by the worker and
//! never reach the caller.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provider_sdk::ProviderIdentity;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::envelope::ActionEnvelope;
use crate::error::GatewayError;
use crate::redact::redact_parameters;

/// Result of one dispatch as recorded
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transient: Option<bool>,
    pub attempts: u32,
    pub latency_ms: u64,
}

impl AuditOutcome {
    pub fn succeeded(attempts: u32, latency_ms: u64) -> Self {
        Self {
            success: true,
            error_kind: None,
            message: None,
            transient: None,
            attempts,
            latency_ms,
        }
    }

    /// Classification only; the message is the already-scrubbed caller text
    pub fn failed(error: &GatewayError, latency_ms: u64) -> Self {
        let body = error.to_body();
        Self {
            success: false,
            error_kind: Some(body.kind.to_string()),
            message: Some(body.message),
            transient: Some(body.transient),
            attempts: error.attempts(),
            latency_ms,
        }
    }
}

/// Write-once record of one dispatched envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub resource: String,
    pub action: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_identity: Option<ProviderIdentity>,
    pub outcome: AuditOutcome,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        request_id: &str,
        envelope: &ActionEnvelope,
        provider_identity: Option<ProviderIdentity>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            session_id: envelope.session_id.clone(),
            resource: envelope.resource.clone(),
            action: envelope.action.clone(),
            parameters: redact_parameters(&envelope.parameters()),
            provider_identity,
            outcome,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for audit records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Writes each record as a structured log event
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(&record)?;
        info!(target: "audit", request_id = %record.request_id, record = %line, "audit");
        Ok(())
    }
}

/// Appends records to a JSON-lines file
pub struct JsonlFileAuditSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlFileAuditSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlFileAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory for inspection
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).push(record);
        Ok(())
    }
}

/// Queue in front of a sink; emitting never waits on the sink
#[derive(Clone)]
pub struct AuditEmitter {
    tx: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditEmitter {
    /// Start the worker on the current runtime
    pub fn spawn(sink: Arc<dyn AuditSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let request_id = record.request_id.clone();
                if let Err(e) = sink.append(record).await {
                    error!(request_id = %request_id, error = %e, "Failed to write audit record");
                }
            }
        });

        (Self { tx }, worker)
    }

    pub fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.tx.send(record) {
            error!(request_id = %e.0.request_id, "Audit worker stopped; record dropped");
        }
    }
}
