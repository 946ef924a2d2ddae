//! Chat completion adapters
//!
//! Conversations continue across calls: each adapter keeps the most recent
//! turns per session and replays them with the next message.

pub mod anthropic;
pub mod google;
mod models;
pub mod openai;

pub use anthropic::{normalize_messages_response, AnthropicAdapter};
pub use google::{normalize_generate_content, GoogleAdapter};
pub use models::{
    ChatCompletionRequest, ChatMessage, GeminiContent, GeminiPart, GenerateContentRequest, GenerationConfig,
    MessagesRequest,
};
pub use openai::{default_endpoint, normalize_chat_completion, OpenAICompatibleAdapter};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{json, Value};

use crate::core::AdapterRequest;
use crate::error::Result;

/// Turns replayed to the provider with each new message
pub const HISTORY_LIMIT: usize = 10;

/// Actions every chat adapter supports
pub const CHAT_ACTIONS: &[&str] = &["send", "clear"];

/// Conversations idle this long are forgotten
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Expired conversations are swept once every this many recorded exchanges
const PURGE_EVERY: u64 = 64;

#[derive(Debug)]
struct Conversation {
    turns: VecDeque<ChatMessage>,
    touched: Instant,
}

/// Recent turns per conversation, forgotten after `idle_ttl` without activity
#[derive(Debug)]
pub struct ConversationStore {
    sessions: DashMap<String, Conversation>,
    idle_ttl: Duration,
    writes: AtomicU64,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_idle_ttl(SESSION_IDLE_TTL)
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
            writes: AtomicU64::new(0),
        }
    }

    /// Up to `HISTORY_LIMIT` most recent turns, oldest first
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        match self.sessions.get(session_id) {
            Some(conversation) if conversation.touched.elapsed() < self.idle_ttl => {
                conversation.turns.iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Record a completed exchange
    pub fn record(&self, session_id: &str, user: ChatMessage, assistant: ChatMessage) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == 0 {
            self.purge_expired();
        }

        let mut conversation = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Conversation {
                turns: VecDeque::new(),
                touched: Instant::now(),
            });

        if conversation.touched.elapsed() >= self.idle_ttl {
            conversation.turns.clear();
        }
        conversation.touched = Instant::now();
        conversation.turns.push_back(user);
        conversation.turns.push_back(assistant);

        while conversation.turns.len() > HISTORY_LIMIT {
            conversation.turns.pop_front();
        }
    }

    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Drop idle conversations; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, c| c.touched.elapsed() < self.idle_ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Conversation key for a request: `parameters.sessionId`, then the envelope session
pub fn conversation_id(request: &AdapterRequest) -> Option<String> {
    request
        .opt_str("sessionId")
        .map(str::to_string)
        .or_else(|| request.session_id.clone())
}

/// Build the message list sent upstream: stored history then the new message
pub fn conversation_for(store: &ConversationStore, session: Option<&str>, message: &str) -> Vec<ChatMessage> {
    let mut messages = session.map(|s| store.history(s)).unwrap_or_default();
    messages.push(ChatMessage::user(message));
    messages
}

/// Handle `clear`, shared by every chat adapter
pub fn clear_conversation(store: &ConversationStore, request: &AdapterRequest) -> Result<Value> {
    let session = conversation_id(request)
        .ok_or_else(|| crate::error::ProviderError::validation("parameter 'sessionId' is required"))?;
    let cleared = store.clear(&session);

    Ok(json!({ "sessionId": session, "cleared": cleared }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_most_recent_turns() {
        let store = ConversationStore::new();
        for i in 0..8 {
            store.record("s1", ChatMessage::user(format!("q{}", i)), ChatMessage::assistant(format!("a{}", i)));
        }

        let history = store.history("s1");
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().content, "q3");
        assert_eq!(history.last().unwrap().content, "a7");
    }

    #[test]
    fn test_idle_conversations_expire() {
        let store = ConversationStore::with_idle_ttl(Duration::from_millis(20));
        store.record("old", ChatMessage::user("hi"), ChatMessage::assistant("hello"));
        assert_eq!(store.history("old").len(), 2);

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.history("old").is_empty());

        store.record("new", ChatMessage::user("hey"), ChatMessage::assistant("yo"));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);

        // A stale conversation picked up again starts from scratch
        std::thread::sleep(Duration::from_millis(40));
        store.record("new", ChatMessage::user("again"), ChatMessage::assistant("sure"));
        assert_eq!(store.history("new").len(), 2);
    }

    #[test]
    fn test_recording_sweeps_idle_sessions() {
        let store = ConversationStore::with_idle_ttl(Duration::from_millis(20));
        for i in 0..PURGE_EVERY {
            store.record(&format!("s{}", i), ChatMessage::user("q"), ChatMessage::assistant("a"));
        }
        assert_eq!(store.len(), PURGE_EVERY as usize);

        std::thread::sleep(Duration::from_millis(40));
        store.record("fresh", ChatMessage::user("q"), ChatMessage::assistant("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_conversation_for_appends_message() {
        let store = ConversationStore::new();
        store.record("s1", ChatMessage::user("hi"), ChatMessage::assistant("hello"));

        let messages = conversation_for(&store, Some("s1"), "how are you");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], ChatMessage::user("how are you"));

        assert_eq!(conversation_for(&store, None, "x").len(), 1);
    }

    #[test]
    fn test_clear_requires_session() {
        let store = ConversationStore::new();
        let request = AdapterRequest::new("clear", Default::default());
        assert!(clear_conversation(&store, &request).is_err());

        let request = request.with_session("s1");
        let result = clear_conversation(&store, &request).unwrap();
        assert_eq!(result["cleared"], false);
    }
}
