//! Centralized default constants for the Cognito backend.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// AUTH
// =============================================================================

/// Name of the session cookie holding the JWT.
pub const AUTH_COOKIE_NAME: &str = "cognito_auth";

/// Name of the short-lived cookie holding the OAuth `state` value.
pub const OAUTH_STATE_COOKIE_NAME: &str = "cognito_oauth_state";

/// Lifetime of the OAuth state cookie in seconds.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Default JWT lifetime in hours (one week).
pub const JWT_EXPIRY_HOURS: i64 = 168;

/// Placeholder secret; startup warns when it is still in use.
pub const JWT_SECRET_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Lifetime recorded for Google refresh tokens.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// OAuth scopes requested from Google.
pub const GOOGLE_OAUTH_SCOPES: &str = "openid email profile";

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Timeout for Google OAuth HTTP calls in seconds.
pub const OAUTH_HTTP_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// ENTRIES AND GOALS
// =============================================================================

/// Default page size for entry listings.
pub const PAGE_LIMIT: i64 = 50;

/// Maximum page size for entry listings.
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Default entry ordering.
pub const ENTRY_ORDER_BY: &str = "date:desc";

/// Relevance score given to new entries.
pub const RELEVANCE_SCORE: f64 = 1.0;

/// Goal category used when a synced goal omits one.
pub const GOAL_CATEGORY: &str = "general";

// =============================================================================
// INFERENCE
// =============================================================================

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_TIMEOUT_SECS: u64 = 60;
pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 1024;

pub const OLLAMA_URL: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "llama3.2";
pub const OLLAMA_TIMEOUT_SECS: u64 = 120;

/// Sampling temperature for both providers.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Calls slower than this are logged at WARN.
pub const SLOW_GENERATION_THRESHOLD_MS: u64 = 30_000;

// =============================================================================
// RETRY
// =============================================================================

/// Total attempts for a rate-limited LLM call (first try included).
pub const LLM_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry in milliseconds.
pub const LLM_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Backoff multiplier between retries.
pub const LLM_BACKOFF_MULTIPLIER: f64 = 2.0;

// =============================================================================
// SYNC
// =============================================================================

/// Queued refines processed per sync request.
pub const PENDING_REFINE_BATCH: i64 = 5;

/// A refine left in `processing` this long is treated as abandoned and
/// becomes eligible again. Exceeds the worst-case local LLM retry chain.
pub const REFINE_STALE_AFTER_SECS: i64 = 600;

// =============================================================================
// SERVER
// =============================================================================

pub const SERVER_HOST: &str = "0.0.0.0";
pub const SERVER_PORT: u16 = 8000;
pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const BACKEND_URL: &str = "http://localhost:8000";
pub const DATABASE_URL: &str = "sqlite://./data/journal.db?mode=rwc";

/// Request body limit in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub const RATE_LIMIT_REQUESTS: u32 = 100;
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;
