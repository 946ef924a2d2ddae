//! OpenAI-compatible chat adapter
//!
//! Covers every provider speaking the `/chat/completions` protocol:
//! OpenAI, DeepSeek, Groq, Perplexity and a self-hosted Ollama.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{clear_conversation, conversation_for, conversation_id, ChatCompletionRequest, ChatMessage, ConversationStore, CHAT_ACTIONS};
use crate::config::ProviderCredentials;
use crate::core::{AdapterRequest, AuthScheme, ClientBuilder, EndpointClass, ProviderAdapter, ProviderIdentity, ResourceLifecycle};
use crate::error::{ProviderError, Result};
use crate::services::common::HttpTransport;

/// Default base URL and model for each known OpenAI-compatible provider
pub fn default_endpoint(provider: &str) -> Option<(&'static str, &'static str)> {
    match provider {
        "openai" => Some(("https://api.openai.com/v1", "gpt-4-turbo-preview")),
        "deepseek" => Some(("https://api.deepseek.com/v1", "deepseek-chat")),
        "groq" => Some(("https://api.groq.com/openai/v1", "llama-3.1-70b-versatile")),
        "perplexity" => Some(("https://api.perplexity.ai", "sonar")),
        "ollama" => Some(("http://localhost:11434/v1", "llama3")),
        _ => None,
    }
}

/// Chat adapter for OpenAI-compatible providers
pub struct OpenAICompatibleAdapter {
    identity: ProviderIdentity,
    transport: HttpTransport,
    default_model: String,
    conversations: ConversationStore,
}

impl OpenAICompatibleAdapter {
    /// Build the adapter; remote providers require an API key
    pub fn new(identity: ProviderIdentity, credentials: &ProviderCredentials) -> Result<Self> {
        let fallback_model = default_endpoint(&identity.provider_name).map(|(_, m)| m).unwrap_or("gpt-4o-mini");

        let api_key = match identity.endpoint_class {
            EndpointClass::RemoteManaged => Some(credentials.require_api_key()?.to_string()),
            EndpointClass::SelfHosted => credentials.api_key.clone(),
        };

        let transport = ClientBuilder::new(identity.provider_name.as_str())
            .base_url(credentials.base_url.as_str())
            .auth(AuthScheme::Bearer, api_key)
            .timeout(credentials.timeout)
            .build()?;

        Ok(Self {
            default_model: credentials.option("model").unwrap_or(fallback_model).to_string(),
            identity,
            transport,
            conversations: ConversationStore::new(),
        })
    }

    async fn send(&self, request: &AdapterRequest) -> Result<Value> {
        let message = request.require_str("message")?;
        let session = conversation_id(request);
        let model = request.opt_str("model").unwrap_or(&self.default_model).to_string();

        let body = ChatCompletionRequest {
            model: model.clone(),
            messages: conversation_for(&self.conversations, session.as_deref(), message),
            temperature: request.opt_f64("temperature"),
            max_tokens: request.opt_u64("maxTokens"),
            stream: false,
        };

        let response = self
            .transport
            .post_json("chat/completions", &serde_json::to_value(&body)?)
            .await?;

        let payload = normalize_chat_completion(&self.identity.provider_name, &model, &response)?;

        if let (Some(session), Some(reply)) = (session.as_deref(), payload["message"].as_str()) {
            self.conversations
                .record(session, ChatMessage::user(message), ChatMessage::assistant(reply));
        }

        Ok(payload)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatibleAdapter {
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

/// Normalize a `/chat/completions` response
pub fn normalize_chat_completion(provider: &str, model: &str, response: &Value) -> Result<Value> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::parsing(format!("{} returned no completion choices", provider)))?;

    let usage = response.get("usage").map(|u| {
        json!({
            "inputTokens": u.get("prompt_tokens").and_then(Value::as_u64),
            "outputTokens": u.get("completion_tokens").and_then(Value::as_u64),
        })
    });

    Ok(json!({
        "provider": provider,
        "model": response.get("model").and_then(Value::as_str).unwrap_or(model),
        "message": content,
        "finishReason": response.pointer("/choices/0/finish_reason").cloned().unwrap_or(Value::Null),
        "usage": usage,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_chat_completion() {
        let response = json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        });

        let payload = normalize_chat_completion("openai", "gpt-4-turbo-preview", &response).unwrap();
        assert_eq!(payload["message"], "Hi there");
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["usage"]["outputTokens"], 2);
    }

    #[test]
    fn test_normalize_rejects_empty_choices() {
        let err = normalize_chat_completion("groq", "m", &json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ProviderError::Parsing(_)));
    }

    #[test]
    fn test_remote_provider_requires_key() {
        let identity = ProviderIdentity::new(crate::core::ResourceKind::Chat, "openai", EndpointClass::RemoteManaged);
        let creds = ProviderCredentials::new("openai", "https://api.openai.com/v1");
        assert!(matches!(
            OpenAICompatibleAdapter::new(identity, &creds),
            Err(ProviderError::Configuration(_))
        ));

        let identity = ProviderIdentity::new(crate::core::ResourceKind::Chat, "ollama", EndpointClass::SelfHosted);
        let creds = ProviderCredentials::new("ollama", "http://localhost:11434/v1");
        assert!(OpenAICompatibleAdapter::new(identity, &creds).is_ok());
    }
}
