//! Local process runtime for self-hosted deployments
//!
//! Each call runs in a fresh temporary directory that is removed when the
//! call ends. The child process is killed if the call is cancelled. Only
//! the first `MAX_OUTPUT_BYTES` of each stream are kept; the rest is drained.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::{execution_payload, ExecutionSpec, RUNTIME_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::util::truncate_string;

/// Longest stdout/stderr kept, in characters
const MAX_OUTPUT_CHARS: usize = 100_000;
/// Bytes read into memory per stream
const MAX_OUTPUT_BYTES: u64 = 4 * MAX_OUTPUT_CHARS as u64;

/// Keep the head of a stream and discard the rest so the child never blocks on a full pipe
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    (&mut reader).take(MAX_OUTPUT_BYTES).read_to_end(&mut kept).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(kept)
}

pub struct LocalRuntimeAdapter {
    identity: ProviderIdentity,
    timeout: Duration,
}

impl LocalRuntimeAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Self {
        Self {
            identity,
            timeout: credentials.timeout,
        }
    }

    async fn seed(dir: &Path, spec: &ExecutionSpec) -> Result<()> {
        for file in &spec.files {
            let path = dir.join(file.path.trim());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ProviderError::internal(format!("failed to create seed directory: {}", e)))?;
            }
            tokio::fs::write(&path, &file.content)
                .await
                .map_err(|e| ProviderError::internal(format!("failed to write seed file: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for LocalRuntimeAdapter {
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

        // Removed on drop, whichever way this call ends
        let workdir = TempDir::new()
            .map_err(|e| ProviderError::internal(format!("failed to create working directory: {}", e)))?;
        Self::seed(workdir.path(), &spec).await?;

        let (program, flag) = spec.language.command();
        let mut command = Command::new(program);
        command
            .arg(flag)
            .arg(&spec.code)
            .current_dir(workdir.path())
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("HOME", workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::configuration(format!("interpreter '{}' is not installed", program)));
            }
            Err(e) => return Err(ProviderError::internal(format!("failed to run '{}': {}", program, e))),
        };
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ProviderError::internal("child output was not captured"));
        };

        let run = async {
            tokio::try_join!(child.wait(), read_capped(stdout), read_capped(stderr))
        };
        let (status, stdout, stderr) = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => return Err(ProviderError::internal(format!("failed to run '{}': {}", program, e))),
            Err(_) => {
                return Err(ProviderError::timeout(format!(
                    "execution exceeded {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);

        Ok(execution_payload(
            &truncate_string(&stdout, MAX_OUTPUT_CHARS),
            &truncate_string(&stderr, MAX_OUTPUT_CHARS),
            status.code().map(i64::from),
        ))
    }
}
