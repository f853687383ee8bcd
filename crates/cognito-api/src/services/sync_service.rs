//! Offline-first sync: apply client changes, answer offline messages, run
//! queued refines and return the server delta.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cognito_core::sync::decode_change_data;
use cognito_core::timestamp::{self, should_apply_client_change};
use cognito_core::{
    defaults, ChangeType, CreateEntryRequest, CreateGoalRequest, EntityKind, EntryChangeData,
    EntryRepository, EntryStatus, GoalChangeData, GoalRepository, PendingChange, Result,
    ServerChanges, SyncRequest, SyncResponse, UpdateEntryRequest, UpdateGoalRequest,
};
use cognito_db::Database;

use super::ChatService;

/// Outcome of a single pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeOutcome {
    Applied,
    Skipped,
}

/// Reconciles a client's offline queue with the server copy.
#[derive(Clone)]
pub struct SyncService {
    db: Database,
    chat: ChatService,
}

impl SyncService {
    pub fn new(db: Database, chat: ChatService) -> Self {
        Self { db, chat }
    }

    /// Run a full sync for one user.
    ///
    /// Client changes are applied first, then offline messages and queued
    /// refines are processed, and only then is the delta computed, so the
    /// response already carries the replies and refined output. The
    /// returned `sync_timestamp` is taken just before the delta query.
    #[instrument(skip(self, req), fields(subsystem = "sync", component = "sync_service", op = "sync", user_id = %user_id, pending_count = req.pending_changes.len()))]
    pub async fn sync(&self, user_id: Uuid, req: SyncRequest) -> Result<SyncResponse> {
        let start = Instant::now();

        let (applied, skipped) = self
            .apply_pending_changes(user_id, &req.pending_changes, &req.base_versions)
            .await;

        let pending_messages_processed = self.chat.process_pending_messages(user_id).await;
        let pending_refines_processed = self.chat.process_pending_refines(user_id).await;

        let sync_timestamp = timestamp::format_timestamp(timestamp::now());
        let server_changes = self
            .server_changes(user_id, req.last_synced_at.as_deref())
            .await?;

        info!(
            applied = applied.len(),
            skipped = skipped.len(),
            server_entries = server_changes.entries.len(),
            server_goals = server_changes.goals.len(),
            pending_messages = pending_messages_processed.len(),
            pending_refines = pending_refines_processed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Sync completed"
        );

        Ok(SyncResponse {
            applied,
            skipped,
            server_changes,
            sync_timestamp,
            pending_messages_processed,
            pending_refines_processed,
        })
    }

    /// Apply changes in order; returns `(applied, skipped)` entity ids.
    ///
    /// A change that fails is logged and skipped; it never aborts the batch.
    pub async fn apply_pending_changes(
        &self,
        user_id: Uuid,
        changes: &[PendingChange],
        base_versions: &HashMap<String, i64>,
    ) -> (Vec<String>, Vec<String>) {
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for change in changes {
            let outcome = match self.apply_change(user_id, change, base_versions).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        change_id = %change.id,
                        entity = %change.entity,
                        error = %e,
                        "Failed to apply pending change"
                    );
                    ChangeOutcome::Skipped
                }
            };
            match outcome {
                ChangeOutcome::Applied => applied.push(change.entity_id.clone()),
                ChangeOutcome::Skipped => skipped.push(change.entity_id.clone()),
            }
        }

        debug!(applied = applied.len(), skipped = skipped.len(), "Pending changes processed");
        (applied, skipped)
    }

    async fn apply_change(
        &self,
        user_id: Uuid,
        change: &PendingChange,
        base_versions: &HashMap<String, i64>,
    ) -> Result<ChangeOutcome> {
        let (kind, change_type) = match (
            change.entity.parse::<EntityKind>(),
            change.change_type.parse::<ChangeType>(),
        ) {
            (Ok(kind), Ok(change_type)) => (kind, change_type),
            (Err(e), _) | (_, Err(e)) => {
                warn!(change_id = %change.id, reason = %e, "Skipping unsupported change");
                return Ok(ChangeOutcome::Skipped);
            }
        };

        let entity_id = match Uuid::parse_str(change.entity_id.trim()) {
            Ok(id) => id,
            Err(_) => {
                warn!(change_id = %change.id, entity_id = %change.entity_id, "Skipping change with invalid entity id");
                return Ok(ChangeOutcome::Skipped);
            }
        };

        let client_version = change
            .base_version
            .or_else(|| base_versions.get(&change.entity_id).copied());

        match kind {
            EntityKind::Entry => {
                let data: EntryChangeData = decode_change_data(&change.data)?;
                self.apply_entry_change(user_id, entity_id, change_type, data, change, client_version)
                    .await
            }
            EntityKind::Goal => {
                let data: GoalChangeData = decode_change_data(&change.data)?;
                self.apply_goal_change(user_id, entity_id, change_type, data, change)
                    .await
            }
        }
    }

    async fn apply_entry_change(
        &self,
        user_id: Uuid,
        id: Uuid,
        change_type: ChangeType,
        data: EntryChangeData,
        change: &PendingChange,
        client_version: Option<i64>,
    ) -> Result<ChangeOutcome> {
        let existing = self.db.entries.fetch(user_id, id).await?;

        if let (Some(entry), Some(client_version)) = (&existing, client_version) {
            if entry.version != client_version {
                debug!(
                    entry_id = %id,
                    client_version,
                    server_version = entry.version,
                    "Entry changed on server since client last saw it"
                );
            }
        }

        match (change_type, existing) {
            (ChangeType::Create | ChangeType::Update, None) => {
                let date = match data.date {
                    Some(date) => {
                        timestamp::parse_date(&date)?;
                        date
                    }
                    None => timestamp::today(),
                };
                self.db
                    .entries
                    .insert(
                        user_id,
                        Some(id),
                        CreateEntryRequest {
                            date,
                            conversations: data.conversations.unwrap_or_default(),
                            refined_output: data.refined_output.unwrap_or_default(),
                        },
                    )
                    .await?;
                debug!(entry_id = %id, "Created entry from sync");
                Ok(ChangeOutcome::Applied)
            }
            (ChangeType::Create | ChangeType::Update, Some(entry)) => {
                if !should_apply_client_change(change.timestamp.as_deref(), entry.updated_at) {
                    debug!(entry_id = %id, "Server copy is newer, skipping");
                    return Ok(ChangeOutcome::Skipped);
                }
                let update = UpdateEntryRequest {
                    conversations: data.conversations,
                    refined_output: data.refined_output,
                    relevance_score: data.relevance_score,
                    status: data.status,
                };
                self.db.entries.update(user_id, id, update).await?;
                Ok(ChangeOutcome::Applied)
            }
            (ChangeType::Delete, Some(_)) => {
                let archive = UpdateEntryRequest {
                    status: Some(EntryStatus::Archived),
                    ..Default::default()
                };
                self.db.entries.update(user_id, id, archive).await?;
                debug!(entry_id = %id, "Archived entry from sync");
                Ok(ChangeOutcome::Applied)
            }
            (ChangeType::Delete, None) => Ok(ChangeOutcome::Applied),
        }
    }

    async fn apply_goal_change(
        &self,
        user_id: Uuid,
        id: Uuid,
        change_type: ChangeType,
        data: GoalChangeData,
        change: &PendingChange,
    ) -> Result<ChangeOutcome> {
        let existing = self.db.goals.fetch(user_id, id).await?;

        match (change_type, existing) {
            (ChangeType::Create | ChangeType::Update, None) => {
                let goal = self
                    .db
                    .goals
                    .insert(
                        user_id,
                        Some(id),
                        CreateGoalRequest {
                            category: data
                                .category
                                .unwrap_or_else(|| defaults::GOAL_CATEGORY.to_string()),
                            description: data.description.unwrap_or_default(),
                        },
                    )
                    .await?;
                if data.active == Some(false) {
                    self.db.goals.delete(user_id, goal.id, true).await?;
                }
                debug!(goal_id = %id, "Created goal from sync");
                Ok(ChangeOutcome::Applied)
            }
            (ChangeType::Create | ChangeType::Update, Some(goal)) => {
                if !should_apply_client_change(change.timestamp.as_deref(), goal.updated_at) {
                    debug!(goal_id = %id, "Server copy is newer, skipping");
                    return Ok(ChangeOutcome::Skipped);
                }
                let update = UpdateGoalRequest {
                    category: data.category,
                    description: data.description,
                    active: data.active,
                };
                if !update.is_empty() {
                    self.db.goals.update(user_id, id, update).await?;
                }
                Ok(ChangeOutcome::Applied)
            }
            (ChangeType::Delete, existing) => {
                if existing.is_some() {
                    self.db.goals.delete(user_id, id, true).await?;
                    debug!(goal_id = %id, "Deactivated goal from sync");
                }
                Ok(ChangeOutcome::Applied)
            }
        }
    }

    /// Entries and goals changed after `last_synced_at`, newest first.
    ///
    /// A missing or unparseable timestamp means a full sync.
    pub async fn server_changes(
        &self,
        user_id: Uuid,
        last_synced_at: Option<&str>,
    ) -> Result<ServerChanges> {
        let since = match last_synced_at.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match timestamp::parse_iso_timestamp(raw) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(last_synced_at = %raw, "Invalid last_synced_at, sending full sync");
                    None
                }
            },
            None => None,
        };

        Ok(ServerChanges {
            entries: self.db.entries.list_since(user_id, since).await?,
            goals: self.db.goals.list_since(user_id, since).await?,
        })
    }
}
