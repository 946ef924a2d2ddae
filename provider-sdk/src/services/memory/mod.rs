//! Long-term memory adapters
//!
//! Memories are scoped by an opaque user id: every operation names one, and
//! a memory owned by another user reads as not found. Every provider's
//! records are normalized to `MemoryRecord`.

pub mod local;
pub mod mem0;

pub use local::LocalMemoryAdapter;
pub use mem0::{normalize_mem0_record, Mem0Adapter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::AdapterRequest;
use crate::error::{ProviderError, Result};

pub const MEMORY_ACTIONS: &[&str] = &["add", "search", "get", "update", "delete", "list"];

const DEFAULT_SEARCH_LIMIT: u64 = 10;

/// One stored memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    pub memory: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Parsed memory action
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryOp {
    Add {
        user_id: String,
        messages: Vec<Value>,
        metadata: Map<String, Value>,
    },
    Search {
        user_id: String,
        query: String,
        limit: u64,
    },
    Get {
        user_id: String,
        memory_id: String,
    },
    Update {
        user_id: String,
        memory_id: String,
        data: Value,
    },
    Delete {
        user_id: String,
        memory_id: String,
    },
    List {
        user_id: String,
    },
}

impl MemoryOp {
    pub fn from_request(request: &AdapterRequest) -> Result<Self> {
        let op = match request.action.as_str() {
            "add" => MemoryOp::Add {
                user_id: request.require_str("userId")?.to_string(),
                messages: normalize_messages(
                    request
                        .param("messages")
                        .ok_or_else(|| ProviderError::validation("parameter 'messages' is required"))?,
                )?,
                metadata: session_metadata(request),
            },
            "search" => MemoryOp::Search {
                user_id: request.require_str("userId")?.to_string(),
                query: request.require_str("query")?.to_string(),
                limit: request.opt_u64("limit").unwrap_or(DEFAULT_SEARCH_LIMIT).max(1),
            },
            "get" => MemoryOp::Get {
                user_id: request.require_str("userId")?.to_string(),
                memory_id: request.require_str("memoryId")?.to_string(),
            },
            "update" => MemoryOp::Update {
                user_id: request.require_str("userId")?.to_string(),
                memory_id: request.require_str("memoryId")?.to_string(),
                data: request
                    .param("data")
                    .cloned()
                    .ok_or_else(|| ProviderError::validation("parameter 'data' is required"))?,
            },
            "delete" => MemoryOp::Delete {
                user_id: request.require_str("userId")?.to_string(),
                memory_id: request.require_str("memoryId")?.to_string(),
            },
            "list" => MemoryOp::List {
                user_id: request.require_str("userId")?.to_string(),
            },
            other => return Err(ProviderError::validation(format!("unsupported memory action '{}'", other))),
        };

        Ok(op)
    }
}

/// Messages may be a list of `{role, content}` or one plain string
fn normalize_messages(messages: &Value) -> Result<Vec<Value>> {
    match messages {
        Value::String(text) if !text.trim().is_empty() => Ok(vec![json!({ "role": "user", "content": text })]),
        Value::Array(items) if !items.is_empty() => Ok(items.clone()),
        _ => Err(ProviderError::validation("parameter 'messages' must be a non-empty string or list")),
    }
}

/// Caller metadata plus the session id and a timestamp
fn session_metadata(request: &AdapterRequest) -> Map<String, Value> {
    let mut metadata = request
        .param("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(ref session) = request.session_id {
        metadata.insert("session_id".into(), Value::String(session.clone()));
    }
    metadata.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
    metadata
}

/// Text of a message list, one message per line
pub fn messages_text(messages: &[Value]) -> String {
    messages
        .iter()
        .filter_map(|m| m.get("content").and_then(Value::as_str).or_else(|| m.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn records_payload(records: Vec<MemoryRecord>) -> Value {
    json!({ "count": records.len(), "memories": records })
}

pub fn record_payload(record: MemoryRecord) -> Value {
    json!({ "memory": record })
}

pub fn deleted_payload(memory_id: &str) -> Value {
    json!({ "memoryId": memory_id, "deleted": true })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: &str, params: Value) -> AdapterRequest {
        AdapterRequest::new(action, params.as_object().cloned().unwrap())
    }

    #[test]
    fn test_add_wraps_string_message_and_tags_session() {
        let op = MemoryOp::from_request(
            &request("add", json!({"userId": "u1", "messages": "I like tea"})).with_session("s1"),
        )
        .unwrap();

        let MemoryOp::Add { messages, metadata, .. } = op else {
            panic!("expected add");
        };
        assert_eq!(messages_text(&messages), "I like tea");
        assert_eq!(metadata["session_id"], "s1");
        assert!(metadata.contains_key("timestamp"));
    }

    #[test]
    fn test_required_parameters() {
        assert!(MemoryOp::from_request(&request("search", json!({"query": "tea"}))).is_err());
        assert!(MemoryOp::from_request(&request("update", json!({"userId": "u1", "memoryId": "m1"}))).is_err());
        assert!(MemoryOp::from_request(&request("get", json!({"memoryId": "m1"}))).is_err());
        assert!(MemoryOp::from_request(&request("delete", json!({"memoryId": "m1"}))).is_err());
        assert!(MemoryOp::from_request(&request("add", json!({"userId": "u1", "messages": []}))).is_err());
        assert!(MemoryOp::from_request(&request("forget", json!({}))).is_err());
    }
}
