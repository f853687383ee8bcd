//! Wire types for offline-first sync.
//!
//! Clients queue mutations while offline and post them in one batch. Each
//! change is resolved independently with last-write-wins against the server
//! copy; see `timestamp::should_apply_client_change`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Conversation, Entry, EntryStatus, Goal};

/// Mutation kind of a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl std::str::FromStr for ChangeType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Unknown change type: {}", s)),
        }
    }
}

/// Entity a pending change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Entry,
    Goal,
}

impl std::str::FromStr for EntityKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Self::Entry),
            "goal" => Ok(Self::Goal),
            _ => Err(format!("Unknown entity: {}", s)),
        }
    }
}

/// A mutation recorded by the client while offline.
///
/// `type` and `entity` stay strings on the wire so one unknown value skips
/// that change instead of rejecting the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: String,
    #[serde(rename = "type")]
    pub change_type: String,
    pub entity: String,
    pub entity_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub base_version: Option<i64>,
    /// Client time of the mutation, ISO 8601.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub last_synced_at: Option<String>,
    #[serde(default)]
    pub pending_changes: Vec<PendingChange>,
    /// Version of each entity the client last saw, keyed by entity id.
    #[serde(default)]
    pub base_versions: HashMap<String, i64>,
}

/// Server-side records changed since the client's last sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerChanges {
    pub entries: Vec<Entry>,
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Entity ids of pending changes that were applied.
    pub applied: Vec<String>,
    /// Entity ids of pending changes that lost LWW or could not be applied.
    pub skipped: Vec<String>,
    pub server_changes: ServerChanges,
    /// Pass back as `last_synced_at` on the next sync.
    pub sync_timestamp: String,
    /// Entry ids whose offline messages received replies.
    pub pending_messages_processed: Vec<String>,
    /// Entry ids whose queued refinement ran during this sync.
    #[serde(default)]
    pub pending_refines_processed: Vec<String>,
}

/// Payload of an entry change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryChangeData {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub conversations: Option<Vec<Conversation>>,
    #[serde(default)]
    pub refined_output: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
}

/// Payload of a goal change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalChangeData {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Decode a change payload; `null` is treated as an empty object.
pub fn decode_change_data<T>(data: &serde_json::Value) -> crate::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if data.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(data.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_change_wire_names() {
        let change: PendingChange = serde_json::from_value(json!({
            "id": "c1",
            "type": "update",
            "entity": "entry",
            "entity_id": "6f1c1d3e-9d8c-4a47-9b7a-1d2c3e4f5a6b",
            "data": {"refined_output": "x"},
            "timestamp": "2024-12-30T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(change.change_type.parse::<ChangeType>(), Ok(ChangeType::Update));
        assert_eq!(change.entity.parse::<EntityKind>(), Ok(EntityKind::Entry));
        assert!(change.base_version.is_none());
    }

    #[test]
    fn test_unknown_kinds_fail_to_parse() {
        assert!("upsert".parse::<ChangeType>().is_err());
        assert!("notification".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_sync_request_defaults() {
        let req: SyncRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.last_synced_at.is_none());
        assert!(req.pending_changes.is_empty());
        assert!(req.base_versions.is_empty());
    }

    #[test]
    fn test_decode_entry_change_data() {
        let data = json!({
            "date": "2024-12-30",
            "conversations": [{"messages": [{"role": "user", "content": "hi"}]}],
            "status": "archived"
        });
        let decoded: EntryChangeData = decode_change_data(&data).unwrap();
        assert_eq!(decoded.date.as_deref(), Some("2024-12-30"));
        assert_eq!(decoded.conversations.unwrap()[0].messages[0].content, "hi");
        assert_eq!(decoded.status, Some(EntryStatus::Archived));
    }

    #[test]
    fn test_decode_null_data_is_default() {
        let decoded: GoalChangeData = decode_change_data(&serde_json::Value::Null).unwrap();
        assert_eq!(decoded, GoalChangeData::default());
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let data = json!({"conversations": "not a list"});
        assert!(decode_change_data::<EntryChangeData>(&data).is_err());
    }
}
