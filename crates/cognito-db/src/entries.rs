//! Entry repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use cognito_core::timestamp::{format_timestamp, now, parse_db_timestamp};
use cognito_core::{
    defaults, Conversation, CreateEntryRequest, Entry, EntryRepository, EntryStatus, EntryVersion,
    Error, ListEntriesRequest, RefineStatus, Result, UpdateEntryRequest,
};

use crate::parse_uuid;

const ENTRY_COLUMNS: &str = "id, date, conversations, refined_output, relevance_score,
    last_interacted_at, interaction_count, status, pending_refine, refine_status,
    refine_error, version, created_at, updated_at";

/// `processing` rows last touched before this are abandoned refines.
fn stale_processing_cutoff() -> String {
    format_timestamp(now() - Duration::seconds(defaults::REFINE_STALE_AFTER_SECS))
}

/// SQLite implementation of EntryRepository.
#[derive(Clone)]
pub struct SqliteEntryRepository {
    pool: SqlitePool,
}

impl SqliteEntryRepository {
    /// Create a new SqliteEntryRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch an entry within an existing transaction.
    pub async fn fetch_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entries WHERE id = ? AND user_id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_entry).transpose()
    }

    /// Copy the current version and refined output into `entry_versions`.
    async fn snapshot_tx(&self, tx: &mut Transaction<'_, Sqlite>, entry: &Entry) -> Result<()> {
        sqlx::query(
            "INSERT INTO entry_versions (id, entry_id, version, content_snapshot, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(entry.id.to_string())
        .bind(entry.version)
        .bind(&entry.refined_output)
        .bind(format_timestamp(now()))
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch_many(&self, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<Entry>> {
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_entry).collect()
    }
}

fn map_row_to_entry(row: &SqliteRow) -> Result<Entry> {
    let conversations_json: String = row.try_get("conversations").map_err(Error::Database)?;
    let conversations: Vec<Conversation> = serde_json::from_str(&conversations_json)?;
    let status: String = row.try_get("status").map_err(Error::Database)?;
    let refine_status: String = row.try_get("refine_status").map_err(Error::Database)?;

    Ok(Entry {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(Error::Database)?)?,
        date: row.try_get("date").map_err(Error::Database)?,
        conversations,
        refined_output: row.try_get("refined_output").map_err(Error::Database)?,
        relevance_score: row.try_get("relevance_score").map_err(Error::Database)?,
        last_interacted_at: parse_db_timestamp(
            &row.try_get::<String, _>("last_interacted_at")
                .map_err(Error::Database)?,
        )?,
        interaction_count: row.try_get("interaction_count").map_err(Error::Database)?,
        status: status.parse::<EntryStatus>().map_err(Error::Internal)?,
        pending_refine: row.try_get("pending_refine").map_err(Error::Database)?,
        refine_status: refine_status.parse::<RefineStatus>().map_err(Error::Internal)?,
        refine_error: row.try_get("refine_error").map_err(Error::Database)?,
        version: row.try_get("version").map_err(Error::Database)?,
        created_at: parse_db_timestamp(&row.try_get::<String, _>("created_at").map_err(Error::Database)?)?,
        updated_at: parse_db_timestamp(&row.try_get::<String, _>("updated_at").map_err(Error::Database)?)?,
    })
}

fn map_row_to_version(row: &SqliteRow) -> Result<EntryVersion> {
    Ok(EntryVersion {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(Error::Database)?)?,
        entry_id: parse_uuid(&row.try_get::<String, _>("entry_id").map_err(Error::Database)?)?,
        version: row.try_get("version").map_err(Error::Database)?,
        content_snapshot: row.try_get("content_snapshot").map_err(Error::Database)?,
        created_at: parse_db_timestamp(&row.try_get::<String, _>("created_at").map_err(Error::Database)?)?,
    })
}

/// Append the `WHERE` clause shared by the list and count queries.
fn push_list_filters(qb: &mut QueryBuilder<'_, Sqlite>, user_id: Uuid, req: &ListEntriesRequest) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
    if let Some(status) = req.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(after) = &req.after_date {
        qb.push(" AND date > ").push_bind(after.clone());
    }
    if let Some(before) = &req.before_date {
        qb.push(" AND date < ").push_bind(before.clone());
    }
}

#[async_trait]
impl EntryRepository for SqliteEntryRepository {
    async fn list(&self, user_id: Uuid, req: &ListEntriesRequest) -> Result<(Vec<Entry>, i64)> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM entries");
        push_list_filters(&mut count_qb, user_id, req);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .try_get("total")
            .map_err(Error::Database)?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM entries", ENTRY_COLUMNS));
        push_list_filters(&mut qb, user_id, req);
        qb.push(" ORDER BY ")
            .push(req.order.to_sql())
            .push(", id ASC LIMIT ")
            .push_bind(req.limit)
            .push(" OFFSET ")
            .push_bind(req.offset);

        let entries = self.fetch_many(qb).await?;
        Ok((entries, total))
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entries WHERE id = ? AND user_id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_entry).transpose()
    }

    async fn fetch_by_date(&self, user_id: Uuid, date: &str) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entries WHERE user_id = ? AND date = ?
             ORDER BY created_at ASC LIMIT 1",
            ENTRY_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_entry).transpose()
    }

    async fn insert(
        &self,
        user_id: Uuid,
        id: Option<Uuid>,
        req: CreateEntryRequest,
    ) -> Result<Entry> {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let ts = format_timestamp(now());
        let conversations = serde_json::to_string(&req.conversations)?;

        sqlx::query(
            "INSERT INTO entries (id, user_id, date, conversations, refined_output,
                                  relevance_score, last_interacted_at, interaction_count,
                                  status, pending_refine, refine_status, version,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 'active', 0, 'idle', 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(&req.date)
        .bind(conversations)
        .bind(&req.refined_output)
        .bind(defaults::RELEVANCE_SCORE)
        .bind(&ts)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "database",
            component = "entries",
            op = "insert",
            entry_id = %id,
            date = %req.date,
            "Entry created"
        );

        self.fetch(user_id, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Entry {} vanished after insert", id)))
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateEntryRequest,
    ) -> Result<Option<Entry>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let Some(current) = self.fetch_tx(&mut tx, user_id, id).await? else {
            return Ok(None);
        };

        self.snapshot_tx(&mut tx, &current).await?;

        let conversations = match &req.conversations {
            Some(c) => serde_json::to_string(c)?,
            None => serde_json::to_string(&current.conversations)?,
        };
        let refined_output = req.refined_output.unwrap_or(current.refined_output);
        let relevance_score = req.relevance_score.unwrap_or(current.relevance_score);
        let status = req.status.unwrap_or(current.status);

        sqlx::query(
            "UPDATE entries
             SET conversations = ?, refined_output = ?, relevance_score = ?, status = ?,
                 version = version + 1, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(conversations)
        .bind(refined_output)
        .bind(relevance_score)
        .bind(status.as_str())
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let updated = self.fetch_tx(&mut tx, user_id, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "database",
            component = "entries",
            op = "update",
            entry_id = %id,
            version = current.version + 1,
            "Entry updated"
        );
        Ok(updated)
    }

    async fn record_interaction(&self, user_id: Uuid, id: Uuid) -> Result<Option<Entry>> {
        sqlx::query(
            "UPDATE entries
             SET last_interacted_at = ?, interaction_count = interaction_count + 1
             WHERE id = ? AND user_id = ?",
        )
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.fetch(user_id, id).await
    }

    async fn list_versions(&self, user_id: Uuid, id: Uuid) -> Result<Vec<EntryVersion>> {
        let rows = sqlx::query(
            "SELECT v.id, v.entry_id, v.version, v.content_snapshot, v.created_at
             FROM entry_versions v
             JOIN entries e ON e.id = v.entry_id
             WHERE v.entry_id = ? AND e.user_id = ?
             ORDER BY v.version DESC",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(map_row_to_version).collect()
    }

    async fn list_since(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Entry>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM entries", ENTRY_COLUMNS));
        qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
        if let Some(since) = since {
            qb.push(" AND updated_at > ").push_bind(format_timestamp(since));
        }
        qb.push(" ORDER BY updated_at DESC");
        self.fetch_many(qb).await
    }

    async fn list_with_pending_responses(&self, user_id: Uuid) -> Result<Vec<Entry>> {
        // Conversations are stored compactly, so the flag text is exact.
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entries
             WHERE user_id = ? AND status = 'active'
               AND conversations LIKE '%\"pending_response\":true%'
             ORDER BY date ASC",
            ENTRY_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let entries: Vec<Entry> = rows.iter().map(map_row_to_entry).collect::<Result<_>>()?;
        Ok(entries
            .into_iter()
            .filter(Entry::has_pending_responses)
            .collect())
    }

    async fn list_pending_refine(&self, user_id: Uuid, limit: i64) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entries
             WHERE user_id = ? AND pending_refine = 1
               AND (refine_status != 'processing' OR updated_at < ?)
             ORDER BY updated_at ASC
             LIMIT ?",
            ENTRY_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(stale_processing_cutoff())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(map_row_to_entry).collect()
    }

    async fn set_pending_refine(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entries
             SET pending_refine = 1, refine_status = 'idle', refine_error = NULL, updated_at = ?
             WHERE id = ? AND user_id = ?
               AND ((pending_refine = 0 AND refine_status != 'processing')
                    OR (refine_status = 'processing' AND updated_at < ?))",
        )
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(stale_processing_cutoff())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_refine_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        status: RefineStatus,
        error: Option<&str>,
    ) -> Result<()> {
        // Terminal states leave the queue.
        let clear_pending = matches!(status, RefineStatus::Completed | RefineStatus::Failed);
        sqlx::query(
            "UPDATE entries
             SET refine_status = ?, refine_error = ?,
                 pending_refine = CASE WHEN ? THEN 0 ELSE pending_refine END,
                 updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(clear_pending)
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete_refine(&self, user_id: Uuid, id: Uuid, refined_output: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let current = self
            .fetch_tx(&mut tx, user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound("Entry not found".to_string()))?;
        self.snapshot_tx(&mut tx, &current).await?;

        sqlx::query(
            "UPDATE entries
             SET refined_output = ?, refine_status = 'completed', refine_error = NULL,
                 pending_refine = 0, version = version + 1, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(refined_output)
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
