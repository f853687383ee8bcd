//! # cognito-inference
//!
//! LLM generation backends for the Cognito journal backend.
//!
//! This crate provides:
//! - `GeminiBackend` for Google's hosted models
//! - `OllamaBackend` for local models
//! - `LlmRouter`, which picks a backend per call and retries HTTP 429 with
//!   exponential backoff
//! - The chat and refine system prompts
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cognito_inference::{GeminiBackend, GeminiConfig, LlmRouter, OllamaBackend};
//!
//! let cloud = GeminiBackend::with_config(GeminiConfig::new(api_key))?;
//! let local = OllamaBackend::from_env()?;
//! let router = LlmRouter::new(Some(Arc::new(cloud)), Arc::new(local));
//!
//! let reply = router.chat(&conversation.turns(), false).await?;
//! ```

pub mod gemini;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod prompts;
pub mod retry;
pub mod router;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use ollama::OllamaBackend;
pub use prompts::{format_conversations, CHAT_SYSTEM_PROMPT, REFINE_SYSTEM_PROMPT};
pub use retry::RetryPolicy;
pub use router::LlmRouter;

// Re-export core traits for convenience
pub use cognito_core::{ChatTurn, GenerationBackend};
