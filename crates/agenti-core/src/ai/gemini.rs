use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{ChatCompletion, GenerationBackend};
use crate::state::ChatRole;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize, Debug)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini uses "model" where other chat APIs say "assistant"
fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

fn chat_request(request: &ChatCompletion) -> GeminiRequest {
    GeminiRequest {
        contents: request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(gemini_role(m.role)),
                parts: vec![GeminiPart { text: m.content.clone() }],
            })
            .collect(),
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: request.system_instruction.clone() }],
        }),
        generation_config: GeminiGenerationConfig {
            temperature: Some(request.temperature),
            response_mime_type: None,
        },
    }
}

fn json_request(prompt: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart { text: prompt.to_string() }],
        }],
        system_instruction: None,
        generation_config: GeminiGenerationConfig {
            temperature: None,
            response_mime_type: Some("application/json"),
        },
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn generate(&self, request: &GeminiRequest) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Ok(gemini_response.text())
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-3-flash-preview".to_string(),
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
        ]
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn complete_chat(&self, request: &ChatCompletion) -> Result<String> {
        self.generate(&chat_request(request)).await
    }

    async fn complete_json(&self, prompt: &str) -> Result<String> {
        self.generate(&json_request(prompt)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_chat_request_maps_roles_and_instruction() {
        let request = ChatCompletion {
            system_instruction: "Be SupportWise".to_string(),
            messages: vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("reset my password"),
            ],
            temperature: 0.7,
        };

        let body = serde_json::to_value(chat_request(&request)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "reset my password");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be SupportWise");
        assert!(body["systemInstruction"].get("role").is_none());
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_json_request_sets_mime_type() {
        let body = serde_json::to_value(json_request("idea")).unwrap();
        assert_eq!(body["generationConfig"], json!({"responseMimeType": "application/json"}));
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "idea");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]}}]
        }))
        .unwrap();
        assert_eq!(response.text(), "Hello");

        let empty: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), "");
    }
}
