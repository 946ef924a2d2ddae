//! In-process memory store for self-hosted deployments
//!
//! Lives for the process lifetime. Search ranks by how many query terms a
//! memory contains.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use super::{deleted_payload, messages_text, record_payload, records_payload, MemoryOp, MemoryRecord, MEMORY_ACTIONS};
use crate::core::{AdapterRequest, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::util::generate_request_id;

pub struct LocalMemoryAdapter {
    identity: ProviderIdentity,
    memories: DashMap<String, MemoryRecord>,
}

impl LocalMemoryAdapter {
    pub fn new(identity: ProviderIdentity) -> Self {
        Self {
            identity,
            memories: DashMap::new(),
        }
    }

    fn add(&self, user_id: String, messages: Vec<Value>, metadata: serde_json::Map<String, Value>) -> Vec<MemoryRecord> {
        let now = Utc::now();
        let record = MemoryRecord {
            id: generate_request_id(),
            memory: messages_text(&messages),
            user_id: Some(user_id),
            metadata,
            created_at: Some(now),
            updated_at: Some(now),
            score: None,
        };

        self.memories.insert(record.id.clone(), record.clone());
        vec![record]
    }

    fn for_user(&self, user_id: &str) -> Vec<MemoryRecord> {
        let mut records: Vec<MemoryRecord> = self
            .memories
            .iter()
            .filter(|entry| entry.user_id.as_deref() == Some(user_id))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    fn search(&self, user_id: &str, query: &str, limit: u64) -> Vec<MemoryRecord> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<MemoryRecord> = self
            .for_user(user_id)
            .into_iter()
            .filter_map(|mut record| {
                let text = record.memory.to_lowercase();
                let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (matched > 0).then(|| {
                    record.score = Some(matched as f64 / terms.len() as f64);
                    record
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);
        hits
    }

    fn get(&self, user_id: &str, memory_id: &str) -> Result<MemoryRecord> {
        self.memories
            .get(memory_id)
            .filter(|record| record.user_id.as_deref() == Some(user_id))
            .map(|record| record.value().clone())
            .ok_or_else(|| not_found(memory_id))
    }

    fn update(&self, user_id: &str, memory_id: &str, data: Value) -> Result<MemoryRecord> {
        let mut record = self
            .memories
            .get_mut(memory_id)
            .filter(|record| record.user_id.as_deref() == Some(user_id))
            .ok_or_else(|| not_found(memory_id))?;

        match data {
            Value::String(text) => record.memory = text,
            Value::Object(fields) => {
                if let Some(text) = fields.get("text").or_else(|| fields.get("memory")).and_then(Value::as_str) {
                    record.memory = text.to_string();
                }
                if let Some(extra) = fields.get("metadata").and_then(Value::as_object) {
                    record.metadata.extend(extra.clone());
                }
            }
            _ => return Err(ProviderError::validation("parameter 'data' must be a string or object")),
        }

        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}

fn not_found(memory_id: &str) -> ProviderError {
    ProviderError::not_found(format!("memory '{}' not found", memory_id))
}

#[async_trait]
impl ProviderAdapter for LocalMemoryAdapter {
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
            MemoryOp::Add { user_id, messages, metadata } => Ok(records_payload(self.add(user_id, messages, metadata))),
            MemoryOp::Search { user_id, query, limit } => Ok(records_payload(self.search(&user_id, &query, limit))),
            MemoryOp::Get { user_id, memory_id } => Ok(record_payload(self.get(&user_id, &memory_id)?)),
            MemoryOp::Update { user_id, memory_id, data } => {
                Ok(record_payload(self.update(&user_id, &memory_id, data)?))
            }
            MemoryOp::Delete { user_id, memory_id } => self
                .memories
                .remove_if(&memory_id, |_, record| record.user_id.as_deref() == Some(user_id.as_str()))
                .map(|_| deleted_payload(&memory_id))
                .ok_or_else(|| not_found(&memory_id)),
            MemoryOp::List { user_id } => Ok(records_payload(self.for_user(&user_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EndpointClass, ResourceKind};
    use serde_json::json;

    fn adapter() -> LocalMemoryAdapter {
        LocalMemoryAdapter::new(ProviderIdentity::new(ResourceKind::Memory, "local", EndpointClass::SelfHosted))
    }

    fn request(action: &str, params: Value) -> AdapterRequest {
        AdapterRequest::new(action, params.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_memory_lifecycle() {
        let memory = adapter();

        let added = memory
            .execute(&request("add", json!({"userId": "u1", "messages": "I drink green tea every morning"})))
            .await
            .unwrap();
        let id = added["memories"][0]["id"].as_str().unwrap().to_string();

        memory
            .execute(&request("add", json!({"userId": "u2", "messages": "tea is overrated"})))
            .await
            .unwrap();

        let found = memory
            .execute(&request("search", json!({"userId": "u1", "query": "green tea"})))
            .await
            .unwrap();
        assert_eq!(found["count"], 1);
        assert_eq!(found["memories"][0]["score"], 1.0);

        let updated = memory
            .execute(&request("update", json!({"userId": "u1", "memoryId": id, "data": {"text": "Prefers black tea"}})))
            .await
            .unwrap();
        assert_eq!(updated["memory"]["memory"], "Prefers black tea");

        let listed = memory.execute(&request("list", json!({"userId": "u1"}))).await.unwrap();
        assert_eq!(listed["count"], 1);

        memory
            .execute(&request("delete", json!({"userId": "u1", "memoryId": id})))
            .await
            .unwrap();
        let err = memory
            .execute(&request("get", json!({"userId": "u1", "memoryId": id})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_users_memory_reads_as_missing() {
        let memory = adapter();

        let added = memory
            .execute(&request("add", json!({"userId": "alice", "messages": "alice secret"})))
            .await
            .unwrap();
        let id = added["memories"][0]["id"].as_str().unwrap().to_string();

        let get = memory
            .execute(&request("get", json!({"userId": "bob", "memoryId": id})))
            .await
            .unwrap_err();
        assert!(matches!(get, ProviderError::NotFound(_)));

        let update = memory
            .execute(&request("update", json!({"userId": "bob", "memoryId": id, "data": "bob was here"})))
            .await
            .unwrap_err();
        assert!(matches!(update, ProviderError::NotFound(_)));

        let delete = memory
            .execute(&request("delete", json!({"userId": "bob", "memoryId": id})))
            .await
            .unwrap_err();
        assert!(matches!(delete, ProviderError::NotFound(_)));

        let owned = memory
            .execute(&request("get", json!({"userId": "alice", "memoryId": id})))
            .await
            .unwrap();
        assert_eq!(owned["memory"]["memory"], "alice secret");
    }
}
