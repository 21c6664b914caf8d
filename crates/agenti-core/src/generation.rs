//! Persona chat and listing drafts on top of a [`GenerationBackend`].
//!
//! Neither operation surfaces backend errors. A failed chat turn yields
//! [`FALLBACK_REPLY`]; a failed or unreadable draft yields `None`.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ai::{ChatCompletion, GeminiClient, GenerationBackend, OllamaClient};
use crate::config::{Config, DEFAULT_TEMPERATURE, clamp_temperature};
use crate::provider::Provider;
use crate::state::{ChatMessage, ChatRole};

/// Shown in place of a reply whenever the endpoint cannot be reached
pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting to my neural network right now. Please try again later.";

/// Shown when the endpoint answers with nothing
pub const BUSY_REPLY: &str = "The agent is busy calculating. Please try again.";

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("draft response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("draft response is not a JSON object")]
    NotAnObject,
}

/// Structured listing proposal returned by [`GenerationClient::draft_listing`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedListingDraft {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

pub fn persona_instruction(agent_name: &str, capability_summary: &str) -> String {
    format!(
        "You are simulating an AI agent named \"{}\". Your core capabilities are: {}. \
         Adopt this persona strictly. Do not break character. \
         Be helpful, concise, and professional.",
        agent_name, capability_summary
    )
}

pub fn draft_prompt(idea: &str) -> String {
    format!(
        "Create a professional marketplace description for an AI agent with this idea: {}. \
         Include: a catchy Name, a Tagline, a detailed 2-paragraph Description, \
         and exactly 4 bullet-pointed Capabilities. \
         Format as clear JSON with keys: name, tagline, description, capabilities.",
        idea
    )
}

/// Strip a surrounding Markdown code fence, if any
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

fn text_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn capability_list(object: &serde_json::Map<String, Value>) -> Vec<String> {
    match object.get("capabilities") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a draft reply. Missing keys become empty fields; only unparseable
/// or non-object replies are errors.
pub fn parse_draft(text: &str) -> Result<GeneratedListingDraft, DraftError> {
    let body = unfence(text);
    let body = if body.is_empty() { "{}" } else { body };

    let value: Value = serde_json::from_str(body)?;
    let Value::Object(object) = value else {
        return Err(DraftError::NotAnObject);
    };

    Ok(GeneratedListingDraft {
        name: text_field(&object, "name"),
        tagline: text_field(&object, "tagline"),
        description: text_field(&object, "description"),
        capabilities: capability_list(&object),
    })
}

/// Stand-in used when no credentials are configured; every call fails
struct UnconfiguredBackend {
    model: String,
    reason: String,
}

#[async_trait]
impl GenerationBackend for UnconfiguredBackend {
    async fn complete_chat(&self, _request: &ChatCompletion) -> Result<String> {
        Err(anyhow!("{}", self.reason))
    }

    async fn complete_json(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("{}", self.reason))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    temperature: f32,
    history_limit: Option<usize>,
    configured: bool,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            temperature: DEFAULT_TEMPERATURE,
            history_limit: None,
            configured: true,
        }
    }

    /// Build the client for the configured provider. A missing Gemini key
    /// still yields a client; its calls degrade like any other failure.
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with_key(config, config.gemini_key())
    }

    fn from_config_with_key(config: &Config, gemini_key: Option<String>) -> Self {
        let model = config.model();
        let backend: Arc<dyn GenerationBackend> = match config.provider() {
            Provider::Gemini => match gemini_key {
                Some(key) => Arc::new(GeminiClient::new(&key, &model)),
                None => {
                    tracing::warn!("no Gemini API key configured; AI features will fall back");
                    let client = Self::new(Arc::new(UnconfiguredBackend {
                        model,
                        reason: "Gemini API key not configured. Set GEMINI_API_KEY.".to_string(),
                    }))
                    .with_temperature(config.temperature())
                    .with_history_limit(config.history_limit);
                    return Self { configured: false, ..client };
                }
            },
            Provider::Ollama => Arc::new(OllamaClient::new(&config.ollama_url(), &model)),
        };

        Self::new(backend)
            .with_temperature(config.temperature())
            .with_history_limit(config.history_limit)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = clamp_temperature(temperature);
        self
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Request payload for one persona turn
    pub fn chat_completion(
        &self,
        agent_name: &str,
        capability_summary: &str,
        prior_messages: &[ChatMessage],
        new_user_text: &str,
    ) -> ChatCompletion {
        let history = match self.history_limit {
            Some(limit) => {
                let window = &prior_messages[prior_messages.len().saturating_sub(limit)..];
                // Never open the window on an assistant turn
                let start = window
                    .iter()
                    .position(|m| m.role == ChatRole::User)
                    .unwrap_or(window.len());
                &window[start..]
            }
            None => prior_messages,
        };

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(new_user_text));

        ChatCompletion {
            system_instruction: persona_instruction(agent_name, capability_summary),
            messages,
            temperature: self.temperature,
        }
    }

    /// Reply in character as `agent_name`. Always returns displayable text.
    pub async fn converse(
        &self,
        agent_name: &str,
        capability_summary: &str,
        prior_messages: &[ChatMessage],
        new_user_text: &str,
    ) -> String {
        let request =
            self.chat_completion(agent_name, capability_summary, prior_messages, new_user_text);

        match self.backend.complete_chat(&request).await {
            Ok(reply) if reply.trim().is_empty() => {
                tracing::warn!(agent = agent_name, "empty reply from model");
                BUSY_REPLY.to_string()
            }
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(agent = agent_name, error = %e, "chat request failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Ask the model for a listing draft; `None` when nothing usable came back.
    pub async fn draft_listing(&self, idea: &str) -> Option<GeneratedListingDraft> {
        let reply = match self.backend.complete_json(&draft_prompt(idea)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "draft request failed");
                return None;
            }
        };

        match parse_draft(&reply) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!(error = %e, "draft response rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::state::Conversation;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request it receives
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String>>>,
        chats: Mutex<Vec<ChatCompletion>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with_replies(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            })
        }

        fn next_reply(&self) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn complete_chat(&self, request: &ChatCompletion) -> Result<String> {
            self.chats.lock().unwrap().push(request.clone());
            self.next_reply()
        }

        async fn complete_json(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.next_reply()
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_converse_returns_reply_and_sends_persona() {
        let backend = ScriptedBackend::with_replies(vec![Ok("Click 'Forgot password'.".to_string())]);
        let client = GenerationClient::new(backend.clone());

        let reply = client
            .converse("SupportWise", "Resolves support tickets", &[], "How do I reset my password?")
            .await;
        assert_eq!(reply, "Click 'Forgot password'.");

        let chats = backend.chats.lock().unwrap();
        assert_eq!(chats.len(), 1);
        let request = &chats[0];
        assert!(request.system_instruction.contains("\"SupportWise\""));
        assert!(request.system_instruction.contains("Resolves support tickets"));
        assert!(request.system_instruction.contains("Do not break character"));
        assert_eq!(request.messages, vec![ChatMessage::user("How do I reset my password?")]);
        assert!((0.6..=0.8).contains(&request.temperature));
    }

    #[tokio::test]
    async fn test_converse_failure_returns_fallback_verbatim() {
        let backend = ScriptedBackend::with_replies(vec![Err(anyhow!("401 Unauthorized"))]);
        let client = GenerationClient::new(backend);

        let reply = client
            .converse("SupportWise", "Support", &[], "How do I reset my password?")
            .await;
        assert_eq!(reply, FALLBACK_REPLY);
        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn test_converse_real_transport_failure_returns_fallback() {
        let backend = Arc::new(GeminiClient::with_base_url("key", "model", "http://127.0.0.1:9"));
        let client = GenerationClient::new(backend);

        let reply = client.converse("SupportWise", "Support", &[], "hello").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_converse_empty_reply_becomes_busy_message() {
        let backend = ScriptedBackend::with_replies(vec![Ok("   ".to_string())]);
        let client = GenerationClient::new(backend);

        let reply = client.converse("SupportWise", "Support", &[], "hello").await;
        assert_eq!(reply, BUSY_REPLY);
    }

    #[tokio::test]
    async fn test_unconfigured_client_falls_back() {
        let config = Config {
            provider: Some("gemini".to_string()),
            gemini_api_key: None,
            ..Config::new()
        };
        let client = GenerationClient::from_config_with_key(&config, None);
        assert!(!client.is_configured());
        assert_eq!(client.converse("X", "Y", &[], "hi").await, FALLBACK_REPLY);
        assert_eq!(client.draft_listing("idea").await, None);

        let blank = Config { gemini_api_key: Some("  ".to_string()), ..config };
        let client = GenerationClient::from_config_with_key(&blank, blank.gemini_key_or(None));
        assert!(!client.is_configured());

        let keyed = GenerationClient::from_config_with_key(&blank, Some("k".to_string()));
        assert!(keyed.is_configured());
    }

    #[tokio::test]
    async fn test_draft_listing_parses_well_formed_json() {
        let backend = ScriptedBackend::with_replies(vec![Ok(
            r#"{"name":"X","tagline":"Y","description":"Z","capabilities":["a","b","c","d"]}"#
                .to_string(),
        )]);
        let client = GenerationClient::new(backend.clone());

        let draft = client.draft_listing("an agent that books meetings").await.unwrap();
        assert_eq!(draft.name, "X");
        assert_eq!(draft.tagline, "Y");
        assert_eq!(draft.description, "Z");
        assert_eq!(draft.capabilities, vec!["a", "b", "c", "d"]);

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("an agent that books meetings"));
        assert!(prompts[0].contains("name, tagline, description, capabilities"));
    }

    #[tokio::test]
    async fn test_draft_listing_missing_capabilities_is_empty() {
        let backend = ScriptedBackend::with_replies(vec![Ok(
            r#"{"name":"X","tagline":"Y","description":"Z"}"#.to_string(),
        )]);
        let client = GenerationClient::new(backend);

        let draft = client.draft_listing("idea").await.unwrap();
        assert_eq!(draft.name, "X");
        assert!(draft.capabilities.is_empty());
    }

    #[tokio::test]
    async fn test_draft_listing_endpoint_error_is_none() {
        let backend = ScriptedBackend::with_replies(vec![Err(anyhow!("connection reset"))]);
        let client = GenerationClient::new(backend);
        assert_eq!(client.draft_listing("idea").await, None);
    }

    #[tokio::test]
    async fn test_draft_listing_garbage_is_none() {
        let backend = ScriptedBackend::with_replies(vec![
            Ok("Sure! Here is your agent:".to_string()),
            Ok(r#"["not", "an", "object"]"#.to_string()),
        ]);
        let client = GenerationClient::new(backend);
        assert_eq!(client.draft_listing("idea").await, None);
        assert_eq!(client.draft_listing("idea").await, None);
    }

    #[test]
    fn test_parse_draft_edge_cases() {
        assert_eq!(parse_draft("").unwrap(), GeneratedListingDraft::default());

        let fenced = "```json\n{\"name\": \"Fenced\", \"capabilities\": [\"a\", null, 3]}\n```";
        let draft = parse_draft(fenced).unwrap();
        assert_eq!(draft.name, "Fenced");
        assert_eq!(draft.capabilities, vec!["a", "3"]);
        assert_eq!(draft.tagline, "");

        let odd_types = parse_draft(r#"{"name": 42, "tagline": null, "capabilities": "one"}"#).unwrap();
        assert_eq!(odd_types.name, "42");
        assert_eq!(odd_types.tagline, "");
        assert!(odd_types.capabilities.is_empty());

        assert!(matches!(parse_draft("{"), Err(DraftError::Json(_))));
        assert!(matches!(parse_draft("7"), Err(DraftError::NotAnObject)));
    }

    #[tokio::test]
    async fn test_sequential_exchanges_keep_order_and_alternate() {
        let backend = ScriptedBackend::with_replies(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
            Ok("third".to_string()),
        ]);
        let client = GenerationClient::new(backend.clone());
        let catalog = Catalog::builtin().unwrap();
        let listing = catalog.get("3").unwrap();

        let mut conversation = Conversation::new();
        for text in ["one", "two", "three"] {
            conversation.exchange(&client, listing, text).await;
        }

        let messages = conversation.messages();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            assert_eq!(message.role, expected);
        }
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "first", "two", "second", "three", "third"]);

        // Each request carries the full prior history plus the new turn
        let chats = backend.chats.lock().unwrap();
        assert_eq!(chats[0].messages.len(), 1);
        assert_eq!(chats[1].messages.len(), 3);
        assert_eq!(chats[2].messages.len(), 5);
        assert_eq!(chats[2].messages[4], ChatMessage::user("three"));
    }

    #[test]
    fn test_history_limit_keeps_latest_turns() {
        let backend = ScriptedBackend::with_replies(Vec::new());
        let client = GenerationClient::new(backend).with_history_limit(Some(2));

        let prior = vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
            ChatMessage::assistant("d"),
        ];
        let request = client.chat_completion("Agent", "Stuff", &prior, "e");
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_odd_history_limit_starts_on_user_turn() {
        let backend = ScriptedBackend::with_replies(Vec::new());
        let client = GenerationClient::new(backend).with_history_limit(Some(3));

        let prior = vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
            ChatMessage::assistant("d"),
        ];
        let request = client.chat_completion("Agent", "Stuff", &prior, "e");
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d", "e"]);
        assert_eq!(request.messages[0].role, ChatRole::User);

        let tight = client.clone().with_history_limit(Some(1));
        let request = tight.chat_completion("Agent", "Stuff", &prior, "e");
        assert_eq!(request.messages, vec![ChatMessage::user("e")]);
    }

    #[test]
    fn test_temperature_is_clamped() {
        let backend = ScriptedBackend::with_replies(Vec::new());
        let client = GenerationClient::new(backend).with_temperature(1.2);
        assert_eq!(client.temperature(), 0.8);
    }
}
