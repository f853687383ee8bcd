//! Chat and refine operations shared by the chat routes and sync.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cognito_core::defaults::PENDING_REFINE_BATCH;
use cognito_core::{
    ChatTurn, Conversation, Entry, EntryRepository, Error, Message, MessageRole, PromptSource,
    RefineStatus, Result, UpdateEntryRequest,
};
use cognito_db::Database;
use cognito_inference::{format_conversations, LlmRouter};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub entry_id: Uuid,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub use_local_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub entry_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefineRequest {
    pub entry_id: Uuid,
    #[serde(default)]
    pub use_local_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineResponse {
    pub refined_output: String,
    pub entry_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueRefineRequest {
    pub entry_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRefineResponse {
    pub queued: bool,
    pub entry_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineStatusResponse {
    pub entry_id: Uuid,
    pub pending_refine: bool,
    pub refine_status: RefineStatus,
    pub refine_error: Option<String>,
}

/// LLM-backed operations on a user's entries.
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    llm: LlmRouter,
}

impl ChatService {
    pub fn new(db: Database, llm: LlmRouter) -> Self {
        Self { db, llm }
    }

    async fn load_entry(&self, user_id: Uuid, entry_id: Uuid) -> Result<Entry> {
        self.db
            .entries
            .fetch(user_id, entry_id)
            .await?
            .ok_or_else(|| Error::NotFound("Entry not found".to_string()))
    }

    /// Append a user message, get the assistant reply and persist both.
    ///
    /// Nothing is written when the LLM call fails.
    #[instrument(skip(self, req), fields(subsystem = "api", component = "chat", op = "send_message", entry_id = %req.entry_id))]
    pub async fn send_message(&self, user_id: Uuid, req: ChatRequest) -> Result<ChatResponse> {
        let mut entry = self.load_entry(user_id, req.entry_id).await?;

        let conversation_id = match req.conversation_id {
            Some(id) => id,
            None => {
                let conversation = Conversation::new(PromptSource::User);
                let id = conversation.id;
                entry.conversations.push(conversation);
                id
            }
        };
        let conversation = entry
            .find_conversation_mut(conversation_id)
            .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

        conversation.messages.push(Message::user(req.message));
        let turns = conversation.turns();
        let reply = self.llm.chat(&turns, req.use_local_model).await?;
        conversation.messages.push(Message::assistant(reply.clone()));

        self.db
            .entries
            .update(
                user_id,
                entry.id,
                UpdateEntryRequest {
                    conversations: Some(entry.conversations),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| Error::NotFound("Entry not found".to_string()))?;

        info!(conversation_id = %conversation_id, response_len = reply.len(), "Chat message processed");
        Ok(ChatResponse {
            response: reply,
            conversation_id,
            entry_id: entry.id,
        })
    }

    /// Synthesize the entry's conversations into `refined_output`.
    #[instrument(skip(self), fields(subsystem = "api", component = "chat", op = "refine_entry"))]
    pub async fn refine_entry(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        use_local_model: bool,
    ) -> Result<RefineResponse> {
        let entry = self.load_entry(user_id, entry_id).await?;
        if entry.conversations.is_empty() {
            return Err(Error::InvalidInput("No conversations to refine".to_string()));
        }

        let text = format_conversations(&entry.conversations);
        let refined_output = self.llm.refine(&text, use_local_model).await?;

        self.db
            .entries
            .update(
                user_id,
                entry_id,
                UpdateEntryRequest {
                    refined_output: Some(refined_output.clone()),
                    ..Default::default()
                },
            )
            .await?;

        info!(response_len = refined_output.len(), "Entry refined");
        Ok(RefineResponse {
            refined_output,
            entry_id,
        })
    }

    /// Mark an entry for refinement on the next sync.
    pub async fn queue_refine(&self, user_id: Uuid, entry_id: Uuid) -> Result<QueueRefineResponse> {
        self.load_entry(user_id, entry_id).await?;
        let queued = self.db.entries.set_pending_refine(user_id, entry_id).await?;

        let message = if queued {
            "Entry queued for refinement"
        } else {
            "Entry is already pending or processing refinement"
        };
        debug!(subsystem = "api", entry_id = %entry_id, queued, "Refine queue request");
        Ok(QueueRefineResponse {
            queued,
            entry_id,
            message: message.to_string(),
        })
    }

    pub async fn refine_status(&self, user_id: Uuid, entry_id: Uuid) -> Result<RefineStatusResponse> {
        let entry = self.load_entry(user_id, entry_id).await?;
        Ok(RefineStatusResponse {
            entry_id,
            pending_refine: entry.pending_refine,
            refine_status: entry.refine_status,
            refine_error: entry.refine_error,
        })
    }

    /// Reply to user messages written offline.
    ///
    /// Each pending user message gets an assistant reply inserted right after
    /// it, using the conversation up to that point as context. Failed replies
    /// keep the flag so the next sync tries again. Returns the ids of entries
    /// that changed; errors are logged, never returned.
    #[instrument(skip(self), fields(subsystem = "sync", component = "chat", op = "process_pending_messages"))]
    pub async fn process_pending_messages(&self, user_id: Uuid) -> Vec<String> {
        let entries = match self.db.entries.list_with_pending_responses(user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to load entries with pending messages");
                return Vec::new();
            }
        };

        let mut processed = Vec::new();
        for mut entry in entries {
            if !self.answer_pending_messages(&mut entry).await {
                continue;
            }
            let update = UpdateEntryRequest {
                conversations: Some(entry.conversations),
                ..Default::default()
            };
            match self.db.entries.update(user_id, entry.id, update).await {
                Ok(_) => processed.push(entry.id.to_string()),
                Err(e) => warn!(entry_id = %entry.id, error = %e, "Failed to save pending replies"),
            }
        }

        if !processed.is_empty() {
            info!(result_count = processed.len(), "Answered pending messages");
        }
        processed
    }

    /// Returns true when at least one reply was added.
    async fn answer_pending_messages(&self, entry: &mut Entry) -> bool {
        let mut modified = false;

        for conversation in entry.conversations.iter_mut() {
            let mut index = 0;
            while index < conversation.messages.len() {
                let message = &conversation.messages[index];
                if message.role != MessageRole::User || !message.pending_response {
                    index += 1;
                    continue;
                }

                let turns: Vec<ChatTurn> = conversation.messages[..=index]
                    .iter()
                    .map(|m| ChatTurn {
                        role: m.role,
                        content: m.content.clone(),
                    })
                    .collect();

                match self.llm.chat(&turns, false).await {
                    Ok(reply) => {
                        conversation.messages[index].pending_response = false;
                        conversation
                            .messages
                            .insert(index + 1, Message::assistant(reply));
                        modified = true;
                        index += 2;
                    }
                    Err(e) => {
                        warn!(entry_id = %entry.id, error = %e, "Pending message left unanswered");
                        index += 1;
                    }
                }
            }
        }

        modified
    }

    /// Run queued refinements, oldest first, up to the per-sync batch.
    ///
    /// Returns the ids of entries refined successfully. Failures are
    /// recorded on the entry as `failed` with the error message.
    #[instrument(skip(self), fields(subsystem = "sync", component = "chat", op = "process_pending_refines"))]
    pub async fn process_pending_refines(&self, user_id: Uuid) -> Vec<String> {
        let entries = match self
            .db
            .entries
            .list_pending_refine(user_id, PENDING_REFINE_BATCH)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to load queued refines");
                return Vec::new();
            }
        };

        let mut processed = Vec::new();
        for entry in entries {
            let start = Instant::now();
            match self.run_queued_refine(user_id, &entry).await {
                Ok(()) => {
                    info!(
                        entry_id = %entry.id,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Queued refine completed"
                    );
                    processed.push(entry.id.to_string());
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "Queued refine failed");
                    let message = failure_message(&e);
                    if let Err(e) = self
                        .db
                        .entries
                        .set_refine_status(user_id, entry.id, RefineStatus::Failed, Some(&message))
                        .await
                    {
                        warn!(entry_id = %entry.id, error = %e, "Failed to record refine failure");
                    }
                }
            }
        }
        processed
    }

    async fn run_queued_refine(&self, user_id: Uuid, entry: &Entry) -> Result<()> {
        self.db
            .entries
            .set_refine_status(user_id, entry.id, RefineStatus::Processing, None)
            .await?;

        if entry.conversations.is_empty() {
            return Err(Error::InvalidInput("No conversations to refine".to_string()));
        }

        let text = format_conversations(&entry.conversations);
        let refined_output = self.llm.refine(&text, false).await?;
        self.db
            .entries
            .complete_refine(user_id, entry.id, &refined_output)
            .await
    }
}

/// Error text stored on an entry whose refine failed.
fn failure_message(err: &Error) -> String {
    match err {
        Error::InvalidInput(msg) | Error::Inference(msg) => msg.clone(),
        other => other.to_string(),
    }
}
