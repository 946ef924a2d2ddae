//! Anthropic Messages API adapter

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{clear_conversation, conversation_for, conversation_id, ChatMessage, ConversationStore, MessagesRequest, CHAT_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-opus-4-20250514";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u64 = 4096;

/// Chat adapter for the Anthropic Messages API
pub struct AnthropicAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    default_model: String,
    conversations: ConversationStore,
}

impl AnthropicAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let api_key = credentials.require_api_key()?.to_string();

        let transport = ClientBuilder::new(identity.provider_name.as_str())
            .base_url(credentials.base_url.as_str())
            .auth(AuthScheme::Header("x-api-key".to_string()), Some(api_key))
            .header("anthropic-version", API_VERSION)
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            default_model: credentials.option("model").unwrap_or(DEFAULT_MODEL).to_string(),
            identity,
            transport,
            conversations: ConversationStore::new(),
        })
    }

    async fn send(&self, request: &AdapterRequest) -> Result<Value> {
        let message = request.require_str("message")?;
        let session = conversation_id(request);
        let model = request.opt_str("model").unwrap_or(&self.default_model).to_string();

        let body = MessagesRequest {
            model: model.clone(),
            max_tokens: request.opt_u64("maxTokens").unwrap_or(MAX_TOKENS),
            messages: conversation_for(&self.conversations, session.as_deref(), message),
            temperature: request.opt_f64("temperature"),
        };

        let response = self.transport.post_json("messages", &serde_json::to_value(&body)?).await?;
        let payload = normalize_messages_response(&model, &response)?;

        if let (Some(session), Some(reply)) = (session.as_deref(), payload["message"].as_str()) {
            self.conversations
                .record(session, ChatMessage::user(message), ChatMessage::assistant(reply));
        }

        Ok(payload)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn lifecycle(&self) -> ResourceLifecycle {
        ResourceLifecycle::Stateless
    }

    fn supports_action(&self, action: &str) -> bool {
        CHAT_ACTIONS.contains(&action)
    }

    async fn execute(&self, request: &AdapterRequest) -> Result<Value> {
        match request.action.as_str() {
            "send" => self.send(request).await,
            "clear" => clear_conversation(&self.conversations, request),
            other => Err(ProviderError::validation(format!("unsupported chat action '{}'", other))),
        }
    }
}

/// Normalize a Messages API response; text blocks are concatenated
pub fn normalize_messages_response(model: &str, response: &Value) -> Result<Value> {
    let text: String = response
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::parsing("anthropic returned no text content"));
    }

    Ok(json!({
        "provider": "anthropic",
        "model": response.get("model").and_then(Value::as_str).unwrap_or(model),
        "message": text,
        "finishReason": response.get("stop_reason").cloned().unwrap_or(Value::Null),
        "usage": {
            "inputTokens": response.pointer("/usage/input_tokens").and_then(Value::as_u64),
            "outputTokens": response.pointer("/usage/output_tokens").and_then(Value::as_u64),
        },
    }))
}
