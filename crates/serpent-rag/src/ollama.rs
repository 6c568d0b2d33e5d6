use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use serpent_core::config::GenerationSettings;
use serpent_core::traits::Generator;
use serpent_core::{Error, Result};

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Text generation through a local Ollama server (`POST /api/chat`).
#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            stream: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("ollama request failed: {e}")))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Generation(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Generation(format!("Ollama API error ({status}): {text}")));
        }
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::Generation(format!("unexpected Ollama response: {e}")))?;
        debug!(model = %self.model, chars = parsed.message.content.len(), "ollama answered");
        if parsed.message.content.trim().is_empty() {
            return Err(Error::Generation("empty response from model".into()));
        }
        Ok(parsed.message.content)
    }
}
