//! Domain models for users, journal entries and goals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::timestamp;

// =============================================================================
// USERS
// =============================================================================

/// An authenticated Google account.
///
/// The stored refresh token is deliberately absent; it is only reachable
/// through `UserRepository::fetch_refresh_token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Profile fields used when creating or refreshing a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Stored Google refresh token with its recorded expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRefreshToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// What started a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// User opened the journal and started typing
    #[default]
    User,
    /// User answered a push notification prompt
    Notification,
    /// Continuation of an earlier conversation
    Continuation,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single chat message.
///
/// Deserialization fills in defaults for anything an offline client left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default = "timestamp::now", deserialize_with = "timestamp::lenient::deserialize")]
    pub timestamp: DateTime<Utc>,
    /// Written offline; waiting for an assistant reply on the next sync.
    #[serde(default, deserialize_with = "null_as_false", skip_serializing_if = "is_false")]
    pub pending_response: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: timestamp::now(),
            pending_response: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: timestamp::now(),
            pending_response: false,
        }
    }
}

/// A chat thread inside an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "timestamp::now", deserialize_with = "timestamp::lenient::deserialize")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub prompt_source: PromptSource,
    #[serde(default)]
    pub notification_id: Option<Uuid>,
}

impl Conversation {
    /// Start an empty conversation.
    pub fn new(prompt_source: PromptSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: timestamp::now(),
            messages: Vec::new(),
            prompt_source,
            notification_id: None,
        }
    }

    /// Messages in the shape generation backends consume.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// A message as sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// ENTRIES
// =============================================================================

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Active,
    Archived,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid entry status: {}", s)),
        }
    }
}

/// Refinement state machine.
///
/// `idle -> processing -> completed | failed`. Queuing keeps the status at
/// `idle` and sets `pending_refine` on the entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefineStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Failed,
}

impl RefineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RefineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RefineStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid refine status: {}", s)),
        }
    }
}

/// One journal day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    /// Journal date, `YYYY-MM-DD`.
    pub date: String,
    pub conversations: Vec<Conversation>,
    pub refined_output: String,
    pub relevance_score: f64,
    pub last_interacted_at: DateTime<Utc>,
    pub interaction_count: i64,
    pub status: EntryStatus,
    pub pending_refine: bool,
    pub refine_status: RefineStatus,
    pub refine_error: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn find_conversation_mut(&mut self, id: Uuid) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// True when any user message is still waiting for a reply.
    pub fn has_pending_responses(&self) -> bool {
        self.conversations
            .iter()
            .flat_map(|c| c.messages.iter())
            .any(|m| m.pending_response && m.role == MessageRole::User)
    }
}

/// Snapshot of an entry's refined output taken before an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryVersion {
    pub id: Uuid,
    pub entry_id: Uuid,
    /// Version the entry had when the snapshot was taken.
    pub version: i64,
    pub content_snapshot: String,
    pub created_at: DateTime<Utc>,
}

/// Request to create an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub date: String,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub refined_output: String,
}

/// Partial entry update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    pub conversations: Option<Vec<Conversation>>,
    #[serde(default)]
    pub refined_output: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
}

/// Columns entries may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrderField {
    Date,
    CreatedAt,
    UpdatedAt,
    LastInteractedAt,
    RelevanceScore,
    InteractionCount,
}

impl EntryOrderField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::LastInteractedAt => "last_interacted_at",
            Self::RelevanceScore => "relevance_score",
            Self::InteractionCount => "interaction_count",
        }
    }
}

/// Ordering parsed from `field:direction`, e.g. `date:desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOrder {
    pub field: EntryOrderField,
    pub descending: bool,
}

impl Default for EntryOrder {
    fn default() -> Self {
        Self {
            field: EntryOrderField::Date,
            descending: true,
        }
    }
}

impl EntryOrder {
    /// SQL `ORDER BY` clause body. Only whitelisted identifiers are emitted.
    pub fn to_sql(&self) -> String {
        format!(
            "{} {}",
            self.field.column(),
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

impl std::str::FromStr for EntryOrder {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (field, direction) = s.split_once(':').unwrap_or((s, "desc"));
        let field = match field.trim().to_lowercase().as_str() {
            "date" => EntryOrderField::Date,
            "created_at" => EntryOrderField::CreatedAt,
            "updated_at" => EntryOrderField::UpdatedAt,
            "last_interacted_at" => EntryOrderField::LastInteractedAt,
            "relevance_score" => EntryOrderField::RelevanceScore,
            "interaction_count" => EntryOrderField::InteractionCount,
            other => return Err(format!("Invalid order field: {}", other)),
        };
        let descending = match direction.trim().to_lowercase().as_str() {
            "desc" => true,
            "asc" => false,
            other => return Err(format!("Invalid order direction: {}", other)),
        };
        Ok(Self { field, descending })
    }
}

/// Filters and paging for entry listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntriesRequest {
    pub status: Option<EntryStatus>,
    /// Exclusive lower bound on `date`.
    pub after_date: Option<String>,
    /// Exclusive upper bound on `date`.
    pub before_date: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub order: EntryOrder,
}

impl Default for ListEntriesRequest {
    fn default() -> Self {
        Self {
            status: None,
            after_date: None,
            before_date: None,
            limit: defaults::PAGE_LIMIT,
            offset: 0,
            order: EntryOrder::default(),
        }
    }
}

// =============================================================================
// GOALS
// =============================================================================

/// Something the user is working towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub category: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGoalRequest {
    pub category: String,
    pub description: String,
}

/// Partial goal update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateGoalRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UpdateGoalRequest {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.description.is_none() && self.active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_defaults_fill_missing_fields() {
        let msg: Message = serde_json::from_value(json!({})).unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "");
        assert!(!msg.pending_response);
    }

    #[test]
    fn test_message_accepts_naive_timestamp() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": "hi",
            "timestamp": "2024-12-30T12:00:00"
        }))
        .unwrap();
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(
            timestamp::format_timestamp(msg.timestamp),
            "2024-12-30T12:00:00.000000Z"
        );
    }

    #[test]
    fn test_message_pending_response_null_is_false() {
        let msg: Message =
            serde_json::from_value(json!({"content": "x", "pending_response": null})).unwrap();
        assert!(!msg.pending_response);
    }

    #[test]
    fn test_pending_response_only_serialized_when_set() {
        let mut msg = Message::user("hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("pending_response").is_none());

        msg.pending_response = true;
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["pending_response"], json!(true));
    }

    #[test]
    fn test_conversation_defaults() {
        let conv: Conversation = serde_json::from_value(json!({
            "messages": [{"content": "morning"}]
        }))
        .unwrap();
        assert_eq!(conv.prompt_source, PromptSource::User);
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.notification_id.is_none());
        assert!(!conv.id.is_nil());
    }

    #[test]
    fn test_conversation_keeps_given_id() {
        let id = Uuid::new_v4();
        let conv: Conversation = serde_json::from_value(json!({
            "id": id,
            "started_at": "2024-12-30T08:00:00Z",
            "prompt_source": "notification",
            "messages": []
        }))
        .unwrap();
        assert_eq!(conv.id, id);
        assert_eq!(conv.prompt_source, PromptSource::Notification);
    }

    #[test]
    fn test_conversation_turns() {
        let mut conv = Conversation::new(PromptSource::User);
        conv.messages.push(Message::user("a"));
        conv.messages.push(Message::assistant("b"));
        assert_eq!(
            conv.turns(),
            vec![ChatTurn::user("a"), ChatTurn::assistant("b")]
        );
    }

    #[test]
    fn test_entry_order_parse() {
        let order: EntryOrder = "relevance_score:asc".parse().unwrap();
        assert_eq!(order.field, EntryOrderField::RelevanceScore);
        assert!(!order.descending);
        assert_eq!(order.to_sql(), "relevance_score ASC");

        let order: EntryOrder = "updated_at".parse().unwrap();
        assert_eq!(order.to_sql(), "updated_at DESC");
    }

    #[test]
    fn test_entry_order_rejects_unknown_identifiers() {
        assert!("id; DROP TABLE entries:desc".parse::<EntryOrder>().is_err());
        assert!("date:sideways".parse::<EntryOrder>().is_err());
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!("archived".parse::<EntryStatus>().unwrap(), EntryStatus::Archived);
        assert_eq!(RefineStatus::Processing.to_string(), "processing");
        assert!("bogus".parse::<RefineStatus>().is_err());
    }

    #[test]
    fn test_update_goal_request_is_empty() {
        assert!(UpdateGoalRequest::default().is_empty());
        let req = UpdateGoalRequest {
            active: Some(false),
            ..Default::default()
        };
        assert!(!req.is_empty());
    }
}
