//! Shared application state.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use cognito_core::{Error, Result};
use cognito_db::Database;
use cognito_inference::LlmRouter;

use crate::auth::{GoogleOAuthClient, JwtCodec};
use crate::config::Settings;

pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub llm: LlmRouter,
    pub settings: Arc<Settings>,
    pub jwt: JwtCodec,
    pub oauth: GoogleOAuthClient,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(db: Database, llm: LlmRouter, settings: Settings) -> Result<Self> {
        let rate_limiter = if settings.rate_limit_enabled {
            Some(Arc::new(build_rate_limiter(
                settings.rate_limit_requests,
                settings.rate_limit_period_secs,
            )?))
        } else {
            None
        };

        Ok(Self {
            jwt: JwtCodec::new(&settings.jwt_secret, settings.jwt_expiry_hours),
            oauth: GoogleOAuthClient::from_settings(&settings)?,
            db,
            llm,
            settings: Arc::new(settings),
            rate_limiter,
        })
    }
}

/// `requests` per `period_secs`, allowing the whole quota as a burst.
fn build_rate_limiter(requests: u32, period_secs: u64) -> Result<GlobalRateLimiter> {
    let burst = NonZeroU32::new(requests)
        .ok_or_else(|| Error::Config("RATE_LIMIT_REQUESTS must be non-zero".to_string()))?;
    let replenish = Duration::from_secs(period_secs) / burst.get();
    let quota = Quota::with_period(replenish)
        .ok_or_else(|| Error::Config("RATE_LIMIT_PERIOD_SECS must be non-zero".to_string()))?
        .allow_burst(burst);
    Ok(RateLimiter::direct(quota))
}
