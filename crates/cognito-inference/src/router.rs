//! Backend selection for chat and refine calls.

use std::sync::Arc;

use tracing::{debug, instrument};

use cognito_core::{ChatTurn, Error, GenerationBackend, Result};

use crate::prompts::{CHAT_SYSTEM_PROMPT, REFINE_SYSTEM_PROMPT};
use crate::retry::RetryPolicy;

/// Routes generation to the cloud (Gemini) or local (Ollama) backend.
///
/// Every call goes through the retry policy, so callers see either a reply
/// or a final error.
#[derive(Clone)]
pub struct LlmRouter {
    cloud: Option<Arc<dyn GenerationBackend>>,
    local: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
}

impl LlmRouter {
    /// `cloud` is `None` when no Gemini API key is configured.
    pub fn new(cloud: Option<Arc<dyn GenerationBackend>>, local: Arc<dyn GenerationBackend>) -> Self {
        Self {
            cloud,
            local,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_cloud_backend(&self) -> bool {
        self.cloud.is_some()
    }

    /// Pick the backend for a call.
    pub fn backend(&self, use_local_model: bool) -> Result<&Arc<dyn GenerationBackend>> {
        if use_local_model {
            return Ok(&self.local);
        }
        self.cloud.as_ref().ok_or_else(|| {
            Error::Inference("Gemini API key not configured; use the local model".to_string())
        })
    }

    /// Generate with an explicit system prompt.
    pub async fn generate(
        &self,
        system: &str,
        turns: &[ChatTurn],
        use_local_model: bool,
    ) -> Result<String> {
        let backend = self.backend(use_local_model)?;
        debug!(
            subsystem = "inference",
            component = "router",
            provider = backend.provider(),
            model = backend.model_name(),
            "Routing generation"
        );
        self.retry
            .run("generate", || backend.generate(system, turns))
            .await
    }

    /// Next assistant reply for a journaling conversation.
    #[instrument(skip(self, turns), fields(subsystem = "inference", component = "router", op = "chat", turn_count = turns.len()))]
    pub async fn chat(&self, turns: &[ChatTurn], use_local_model: bool) -> Result<String> {
        self.generate(CHAT_SYSTEM_PROMPT, turns, use_local_model).await
    }

    /// Journal entry synthesized from formatted conversations.
    #[instrument(skip(self, conversations_text), fields(subsystem = "inference", component = "router", op = "refine", prompt_len = conversations_text.len()))]
    pub async fn refine(&self, conversations_text: &str, use_local_model: bool) -> Result<String> {
        let turns = [ChatTurn::user(conversations_text)];
        self.generate(REFINE_SYSTEM_PROMPT, &turns, use_local_model)
            .await
    }
}
