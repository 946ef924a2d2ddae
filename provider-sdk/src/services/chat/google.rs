//! Google Gemini `generateContent` adapter

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    clear_conversation, conversation_for, conversation_id, ChatMessage, ConversationStore, GeminiContent,
    GenerateContentRequest, GenerationConfig, CHAT_ACTIONS,
};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

pub struct GoogleAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    default_model: String,
    conversations: ConversationStore,
}

impl GoogleAdapter {
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let transport = ClientBuilder::new(identity.provider_name.as_str())
            .base_url(credentials.base_url.as_str())
            .auth(
                AuthScheme::Header("x-goog-api-key".to_string()),
                Some(credentials.require_api_key()?.to_string()),
            )
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

        let temperature = request.opt_f64("temperature");
        let max_output_tokens = request.opt_u64("maxTokens");
        let body = GenerateContentRequest {
            contents: conversation_for(&self.conversations, session.as_deref(), message)
                .iter()
                .map(GeminiContent::from)
                .collect(),
            generation_config: (temperature.is_some() || max_output_tokens.is_some()).then_some(GenerationConfig {
                temperature,
                max_output_tokens,
            }),
        };

        let endpoint = format!("models/{}:generateContent", model);
        let response = self.transport.post_json(&endpoint, &serde_json::to_value(&body)?).await?;
        let payload = normalize_generate_content(&model, &response)?;

        if let (Some(session), Some(reply)) = (session.as_deref(), payload["message"].as_str()) {
            self.conversations
                .record(session, ChatMessage::user(message), ChatMessage::assistant(reply));
        }

        Ok(payload)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
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

/// Normalize a `generateContent` response from its first candidate
pub fn normalize_generate_content(model: &str, response: &Value) -> Result<Value> {
    let candidate = response.pointer("/candidates/0");

    let text: String = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(|p| p.get("text").and_then(Value::as_str)).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = response
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(ProviderError::parsing(format!("google returned no text content ({})", reason)));
    }

    Ok(json!({
        "provider": "google",
        "model": response.get("modelVersion").and_then(Value::as_str).unwrap_or(model),
        "message": text,
        "finishReason": candidate.and_then(|c| c.get("finishReason")).cloned().unwrap_or(Value::Null),
        "usage": {
            "inputTokens": response.pointer("/usageMetadata/promptTokenCount").and_then(Value::as_u64),
            "outputTokens": response.pointer("/usageMetadata/candidatesTokenCount").and_then(Value::as_u64),
        },
    }))
}
