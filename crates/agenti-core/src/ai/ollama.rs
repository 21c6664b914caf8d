use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{ChatCompletion, GenerationBackend};
use crate::state::ChatRole;

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatResponseMessage,
}

#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

fn chat_request(model: &str, request: &ChatCompletion) -> OllamaChatRequest {
    let mut messages = vec![OllamaChatMessage {
        role: "system",
        content: request.system_instruction.clone(),
    }];
    messages.extend(request.messages.iter().map(|m| OllamaChatMessage {
        role: match m.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        },
        content: m.content.clone(),
    }));

    OllamaChatRequest {
        model: model.to_string(),
        messages,
        stream: false,
        options: OllamaOptions { temperature: request.temperature },
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    async fn complete_chat(&self, request: &ChatCompletion) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&chat_request(&self.model, request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama chat request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        Ok(chat_response.message.content)
    }

    async fn complete_json(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: Some("json".to_string()),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama JSON request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        let generate_response: OllamaGenerateResponse = response.json().await?;
        Ok(generate_response.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;

    #[test]
    fn test_chat_request_prepends_system_turn() {
        let request = ChatCompletion {
            system_instruction: "Stay in character".to_string(),
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hey"), ChatMessage::user("more")],
            temperature: 0.6,
        };

        let body = serde_json::to_value(chat_request("llama3.2:latest", &request)).unwrap();
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "llama3.2:latest");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let client = OllamaClient::new("http://127.0.0.1:9", "any");
        assert!(client.complete_json("{}").await.is_err());
    }
}
