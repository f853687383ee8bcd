//! Ollama generation backend (local models).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cognito_core::{defaults, ChatTurn, Error, GenerationBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::OLLAMA_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = defaults::OLLAMA_TIMEOUT_SECS;

/// Ollama `/api/chat` backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    temperature: f32,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_GEN_MODEL)
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: &str, gen_model: &str) -> Result<Self> {
        let gen_timeout = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            model = %gen_model,
            "Initializing Ollama backend"
        );

        Ok(Self {
            client,
            base_url,
            gen_model: gen_model.to_string(),
            temperature: defaults::GEN_TEMPERATURE,
        })
    }

    /// Create from `OLLAMA_URL` and `OLLAMA_MODEL`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        Self::with_config(&base_url, &gen_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

fn build_messages(system: &str, turns: &[ChatTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: system.to_string(),
    });
    messages.extend(turns.iter().map(|t| ChatMessage {
        role: t.role.to_string(),
        content: t.content.clone(),
    }));
    messages
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, system, turns), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, turn_count = turns.len()))]
    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        let start = Instant::now();

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages: build_messages(system, turns),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RateLimited(format!("Ollama returned {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > defaults::SLOW_GENERATION_THRESHOLD_MS {
            warn!(duration_ms = elapsed, slow = true, "Slow generation operation");
        }
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }
}
