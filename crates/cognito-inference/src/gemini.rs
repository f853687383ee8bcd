//! Google Gemini generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cognito_core::{defaults, ChatTurn, Error, GenerationBackend, MessageRole, Result};

/// Gemini backend configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the `/v1beta` path.
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: defaults::GEMINI_MODEL.to_string(),
            base_url: defaults::GEMINI_BASE_URL.to_string(),
            timeout_secs: defaults::GEMINI_TIMEOUT_SECS,
            temperature: defaults::GEN_TEMPERATURE,
            max_output_tokens: defaults::GEMINI_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a backend; fails when the API key is empty.
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("Gemini API key is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini",
            model = %config.model,
            "Initializing Gemini backend"
        );

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini names the assistant role `model`.
fn gemini_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "model",
    }
}

fn build_request(config: &GeminiConfig, system: &str, turns: &[ChatTurn]) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: turns
            .iter()
            .map(|t| Content {
                role: Some(gemini_role(t.role).to_string()),
                parts: vec![Part {
                    text: t.content.clone(),
                }],
            })
            .collect(),
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: system.to_string(),
            }],
        },
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        },
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Inference("No response from Gemini".to_string()))?;

    candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| Error::Inference("Empty response from Gemini".to_string()))
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    #[instrument(skip(self, system, turns), fields(subsystem = "inference", component = "gemini", op = "generate", model = %self.config.model, turn_count = turns.len()))]
    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        let start = Instant::now();
        let request = build_request(&self.config, system, turns);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e.without_url())))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RateLimited(format!("Gemini returned {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("Gemini returned {}: {}", status, body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e.without_url())))?;
        let content = extract_text(parsed)?;

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
        &self.config.model
    }

    fn provider(&self) -> &'static str {
        "gemini"
    }
}
