//! Code execution adapters
//!
//! Every call gets its own environment: provision, seed files, run one
//! command, capture output, tear down. Teardown happens on every exit path,
//! including cancellation of the calling future.

pub mod e2b;
pub mod local;

pub use e2b::{E2bAdapter, SandboxLease};
pub use local::LocalRuntimeAdapter;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::AdapterRequest;
use crate::error::{ProviderError, Result};

pub const RUNTIME_ACTIONS: &[&str] = &["execute"];

/// Interpreter family for a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Bash,
}

impl Language {
    /// Unknown or missing languages run as shell
    pub fn parse(language: Option<&str>) -> Self {
        match language.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("python") | Some("python3") | Some("py") => Language::Python,
            Some("javascript") | Some("typescript") | Some("js") | Some("ts") | Some("node") | Some("nodejs") => {
                Language::JavaScript
            }
            _ => Language::Bash,
        }
    }

    /// Command and inline-code flag
    pub fn command(&self) -> (&'static str, &'static str) {
        match self {
            Language::Python => ("python3", "-c"),
            Language::JavaScript => ("node", "-e"),
            Language::Bash => ("bash", "-c"),
        }
    }
}

/// File written into the environment before the command runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFile {
    pub path: String,
    pub content: String,
}

/// Parsed `execute` parameters
#[derive(Debug, Clone)]
pub struct ExecutionSpec {
    pub code: String,
    pub language: Language,
    pub files: Vec<SeedFile>,
}

impl ExecutionSpec {
    pub fn from_request(request: &AdapterRequest) -> Result<Self> {
        if request.action != "execute" {
            return Err(ProviderError::validation(format!("unsupported runtime action '{}'", request.action)));
        }

        let code = request.require_str("code")?.to_string();
        let files = match request.param("files") {
            Some(files) => serde_json::from_value::<Vec<SeedFile>>(files.clone())
                .map_err(|_| ProviderError::validation("parameter 'files' must be a list of {path, content}"))?,
            None => Vec::new(),
        };

        if let Some(bad) = files.iter().find(|f| !is_safe_relative_path(&f.path)) {
            return Err(ProviderError::validation(format!("file path '{}' is not allowed", bad.path)));
        }

        Ok(Self {
            code,
            language: Language::parse(request.opt_str("language")),
            files,
        })
    }
}

/// Relative, non-empty, and never escaping its root
pub fn is_safe_relative_path(path: &str) -> bool {
    let path = path.trim();
    !path.is_empty()
        && !path.starts_with('/')
        && !path.starts_with('\\')
        && !path.contains(':')
        && path.split(['/', '\\']).all(|segment| segment != "..")
}

/// Common execution payload
pub fn execution_payload(stdout: &str, stderr: &str, exit_code: Option<i64>) -> Value {
    json!({
        "output": stdout,
        "error": stderr,
        "exitCode": exit_code,
    })
}
