//! Mem0 memory adapter

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{deleted_payload, record_payload, records_payload, MemoryOp, MemoryRecord, MEMORY_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.mem0.ai/v1";

pub struct Mem0Adapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
}

impl Mem0Adapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new("mem0")
            .base_url(credentials.base_url.as_str())
            .auth(AuthScheme::Bearer, Some(credentials.require_api_key()?.to_string()))
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self { identity, transport })
    }

    /// Fetch a memory, reading one owned by another user as not found
    async fn owned_record(&self, user_id: &str, memory_id: &str) -> Result<MemoryRecord> {
        let response = self
            .transport
            .get_json(&format!("memories/{}", memory_id), &[("user_id", user_id.to_string())])
            .await?;
        let record = normalize_mem0_record(&response)?;

        match record.user_id.as_deref() {
            Some(owner) if owner != user_id => Err(ProviderError::not_found(format!("memory '{}' not found", memory_id))),
            _ => Ok(record),
        }
    }
}

#[async_trait]
impl ProviderAdapter for Mem0Adapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::Stateless
    }

    fn supports_action(&self, action: &str) -> bool {
        MEMORY_ACTIONS.contains(&action)
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        match MemoryOp::from_request(request)? {
            MemoryOp::Add { user_id, messages, metadata } => {
                let body = json!({ "messages": messages, "user_id": user_id, "metadata": metadata });
                let response = self.transport.post_json("memories", &body).await?;
                Ok(records_payload(normalize_mem0_list(&response)))
            }
            MemoryOp::Search { user_id, query, limit } => {
                let params = [("query", query), ("user_id", user_id), ("limit", limit.to_string())];
                let response = self.transport.get_json("memories/search", &params).await?;
                Ok(records_payload(normalize_mem0_list(&response)))
            }
            MemoryOp::Get { user_id, memory_id } => Ok(record_payload(self.owned_record(&user_id, &memory_id).await?)),
            MemoryOp::Update { user_id, memory_id, data } => {
                self.owned_record(&user_id, &memory_id).await?;
                let body = match data {
                    Value::String(text) => json!({ "text": text }),
                    other => other,
                };
                let response = self
                    .transport
                    .put_json(&format!("memories/{}", memory_id), &body)
                    .await?;
                Ok(record_payload(normalize_mem0_record(&response).unwrap_or_else(|_| MemoryRecord {
                    id: memory_id,
                    memory: body.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
                    user_id: Some(user_id),
                    metadata: Default::default(),
                    created_at: None,
                    updated_at: Some(Utc::now()),
                    score: None,
                })))
            }
            MemoryOp::Delete { user_id, memory_id } => {
                self.owned_record(&user_id, &memory_id).await?;
                self.transport.delete(&format!("memories/{}", memory_id)).await?;
                Ok(deleted_payload(&memory_id))
            }
            MemoryOp::List { user_id } => {
                let response = self.transport.get_json("memories", &[("user_id", user_id)]).await?;
                Ok(records_payload(normalize_mem0_list(&response)))
            }
        }
    }
}

fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Normalize one Mem0 memory object
pub fn normalize_mem0_record(item: &Value) -> Result<MemoryRecord> {
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::parsing("mem0 memory has no id"))?;

    Ok(MemoryRecord {
        id: id.to_string(),
        memory: item
            .get("memory")
            .or_else(|| item.pointer("/data/memory"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        user_id: item.get("user_id").and_then(Value::as_str).map(str::to_string),
        metadata: item.get("metadata").and_then(Value::as_object).cloned().unwrap_or_default(),
        created_at: parse_time(item.get("created_at")),
        updated_at: parse_time(item.get("updated_at")),
        score: item.get("score").and_then(Value::as_f64),
    })
}

/// Mem0 returns either a bare list or `{"results": [...]}`
pub fn normalize_mem0_list(response: &Value) -> Vec<MemoryRecord> {
    let items = response
        .as_array()
        .or_else(|| response.get("results").and_then(Value::as_array))
        .or_else(|| response.get("memories").and_then(Value::as_array));

    items
        .map(|items| items.iter().filter_map(|i| normalize_mem0_record(i).ok()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mem0_list_shapes() {
        let bare = json!([{"id": "m1", "memory": "likes tea", "user_id": "u1"}]);
        let wrapped = json!({"results": [{"id": "m2", "memory": "lives in Oslo", "score": 0.8}]});

        assert_eq!(normalize_mem0_list(&bare)[0].user_id.as_deref(), Some("u1"));
        assert_eq!(normalize_mem0_list(&wrapped)[0].score, Some(0.8));
        assert!(normalize_mem0_list(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_normalize_record_requires_id() {
        assert!(normalize_mem0_record(&json!({"memory": "x"})).is_err());
        let record = normalize_mem0_record(&json!({"id": "m1", "created_at": "2024-01-01T00:00:00Z"})).unwrap();
        assert!(record.created_at.is_some());
    }
}
