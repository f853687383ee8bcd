//! Exponential backoff for rate-limited generation calls.
//!
//! Only `Error::RateLimited` (HTTP 429) is retried. Every other error is
//! returned on the attempt that produced it.

use std::future::Future;
use std::time::Duration;

use cognito_core::{defaults, Error, Result};

/// Retry schedule for LLM calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::LLM_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(defaults::LLM_INITIAL_BACKOFF_MS),
            multiplier: defaults::LLM_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * multiplier^retry`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .mul_f64(self.multiplier.powi(retry as i32))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    if attempt + 1 < attempts {
                        let delay = self.backoff(attempt);
                        tracing::warn!(
                            subsystem = "inference",
                            component = "retry",
                            op = operation,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(Error::Inference(format!("Max retries exceeded: {}", detail)))
    }
}
