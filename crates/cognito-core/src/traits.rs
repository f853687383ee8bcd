//! Repository and backend traits.
//!
//! Entry and goal operations take the owning user's id; a record that
//! belongs to someone else behaves exactly like a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::*;
use crate::Result;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for Google-authenticated users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, or return the existing one with the same email.
    async fn upsert_by_email(&self, profile: &UserProfile) -> Result<User>;

    async fn fetch(&self, id: Uuid) -> Result<Option<User>>;

    async fn fetch_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Stamp `last_login_at` and refresh name/picture when provided.
    async fn update_last_login(&self, email: &str, profile: Option<&UserProfile>) -> Result<()>;

    /// Store or clear (`None`) the Google refresh token.
    async fn store_refresh_token(
        &self,
        email: &str,
        token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn fetch_refresh_token(&self, email: &str) -> Result<Option<StoredRefreshToken>>;
}

/// Repository for journal entries and their version history.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// List entries matching the filters plus the unpaged total.
    async fn list(&self, user_id: Uuid, req: &ListEntriesRequest) -> Result<(Vec<Entry>, i64)>;

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Option<Entry>>;

    async fn fetch_by_date(&self, user_id: Uuid, date: &str) -> Result<Option<Entry>>;

    /// Insert a new entry; `id` lets sync keep client-generated ids.
    async fn insert(&self, user_id: Uuid, id: Option<Uuid>, req: CreateEntryRequest)
        -> Result<Entry>;

    /// Snapshot the current refined output, apply the update and bump the version.
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateEntryRequest,
    ) -> Result<Option<Entry>>;

    /// Stamp `last_interacted_at` and increment `interaction_count`.
    async fn record_interaction(&self, user_id: Uuid, id: Uuid) -> Result<Option<Entry>>;

    /// Version snapshots, newest first. Empty when the entry is not the user's.
    async fn list_versions(&self, user_id: Uuid, id: Uuid) -> Result<Vec<EntryVersion>>;

    /// Entries updated strictly after `since` (all when `None`), newest first.
    async fn list_since(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Entry>>;

    /// Active entries that hold at least one message awaiting a reply.
    async fn list_with_pending_responses(&self, user_id: Uuid) -> Result<Vec<Entry>>;

    /// Entries queued for refinement, oldest request first. Includes refines
    /// abandoned in `processing` past `REFINE_STALE_AFTER_SECS`.
    async fn list_pending_refine(&self, user_id: Uuid, limit: i64) -> Result<Vec<Entry>>;

    /// Queue an entry for refinement.
    ///
    /// Returns false when it is already queued or actively processing.
    async fn set_pending_refine(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    async fn set_refine_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        status: RefineStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Store the refined output, mark `completed` and clear `pending_refine`.
    async fn complete_refine(&self, user_id: Uuid, id: Uuid, refined_output: &str) -> Result<()>;
}

/// Repository for goals.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Goals newest first, optionally filtered by `active`.
    async fn list(&self, user_id: Uuid, active: Option<bool>) -> Result<Vec<Goal>>;

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>>;

    /// Insert a new goal; `id` lets sync keep client-generated ids.
    async fn insert(&self, user_id: Uuid, id: Option<Uuid>, req: CreateGoalRequest) -> Result<Goal>;

    async fn update(&self, user_id: Uuid, id: Uuid, req: UpdateGoalRequest)
        -> Result<Option<Goal>>;

    /// Soft delete sets `active = false`; hard delete removes the row.
    /// Returns false when nothing matched.
    async fn delete(&self, user_id: Uuid, id: Uuid, soft: bool) -> Result<bool>;

    /// Goals updated strictly after `since` (all when `None`), newest first.
    async fn list_since(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Goal>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for chat-style text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate the next assistant message for a conversation.
    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Provider identifier for logs ("gemini", "ollama", ...).
    fn provider(&self) -> &'static str;
}
