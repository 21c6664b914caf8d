pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::state::ChatMessage;

/// One chat-completion call: a system instruction, the turns so far
/// (ending with the newest user turn) and a sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub system_instruction: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// A hosted or local text-generation endpoint
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Free-text reply to a role-tagged conversation
    async fn complete_chat(&self, request: &ChatCompletion) -> Result<String>;

    /// Raw reply to a single prompt, with JSON output requested
    async fn complete_json(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}
