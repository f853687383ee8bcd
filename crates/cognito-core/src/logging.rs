//! Structured logging field name constants for the Cognito backend.
//!
//! All crates use these names for structured `tracing` fields so that log
//! queries work the same way across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, login, sync completion) |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (individual sync changes) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID attached by the HTTP layer. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "auth", "database", "inference", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "gemini", "ollama", "router", "pool", "entries"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "generate", "chat", "refine", "apply_change"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Internal user UUID.
pub const USER_ID: &str = "user_id";

/// Entry UUID being operated on.
pub const ENTRY_ID: &str = "entry_id";

/// Goal UUID being operated on.
pub const GOAL_ID: &str = "goal_id";

/// Conversation UUID inside an entry.
pub const CONVERSATION_ID: &str = "conversation_id";

/// Client-side pending change id.
pub const CHANGE_ID: &str = "change_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or items returned.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model slug used for generation.
pub const MODEL: &str = "model";

/// Provider name ("gemini" or "ollama").
pub const PROVIDER: &str = "provider";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the operation succeeded.
pub const SUCCESS: &str = "success";

/// Error message on failure.
pub const ERROR_MSG: &str = "error";
