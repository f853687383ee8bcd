//! Mock generation backend for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cognito_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new().with_fixed_response("Tell me more.");
//! let reply = backend.generate("system", &[ChatTurn::user("hi")]).await?;
//! assert_eq!(reply, "Tell me more.");
//! assert_eq!(backend.call_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cognito_core::{ChatTurn, Error, GenerationBackend, Result};

/// A recorded `generate` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub turns: Vec<ChatTurn>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    /// Errors returned, in order, before any response.
    failures: VecDeque<Error>,
}

/// Mock generation backend; clones share the call log.
#[derive(Clone)]
pub struct MockGenerationBackend {
    response: String,
    always_fail: Option<String>,
    state: Arc<Mutex<MockState>>,
}

impl MockGenerationBackend {
    /// Create a new mock backend that answers "Mock response".
    pub fn new() -> Self {
        Self {
            response: "Mock response".to_string(),
            always_fail: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set the response returned by every successful call.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Queue errors returned by the next calls, before succeeding.
    pub fn with_failures(self, failures: Vec<Error>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failures.extend(failures);
        }
        self
    }

    /// Fail every call with `Error::Inference(message)`.
    pub fn always_failing(mut self, message: impl Into<String>) -> Self {
        self.always_fail = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.calls.len()).unwrap_or(0)
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        let queued_failure = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| Error::Internal("mock state poisoned".to_string()))?;
            state.calls.push(MockCall {
                system: system.to_string(),
                turns: turns.to_vec(),
            });
            state.failures.pop_front()
        };

        if let Some(err) = queued_failure {
            return Err(err);
        }
        if let Some(message) = &self.always_fail {
            return Err(Error::Inference(message.clone()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}
