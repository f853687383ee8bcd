//! Goal repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use cognito_core::timestamp::{format_timestamp, now, parse_db_timestamp};
use cognito_core::{
    CreateGoalRequest, Error, Goal, GoalRepository, Result, UpdateGoalRequest,
};

use crate::parse_uuid;

const GOAL_COLUMNS: &str = "id, category, description, active, created_at, updated_at";

/// SQLite implementation of GoalRepository.
#[derive(Clone)]
pub struct SqliteGoalRepository {
    pool: SqlitePool,
}

impl SqliteGoalRepository {
    /// Create a new SqliteGoalRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_row_to_goal(row: &SqliteRow) -> Result<Goal> {
    Ok(Goal {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(Error::Database)?)?,
        category: row.try_get("category").map_err(Error::Database)?,
        description: row.try_get("description").map_err(Error::Database)?,
        active: row.try_get("active").map_err(Error::Database)?,
        created_at: parse_db_timestamp(&row.try_get::<String, _>("created_at").map_err(Error::Database)?)?,
        updated_at: parse_db_timestamp(&row.try_get::<String, _>("updated_at").map_err(Error::Database)?)?,
    })
}

#[async_trait]
impl GoalRepository for SqliteGoalRepository {
    async fn list(&self, user_id: Uuid, active: Option<bool>) -> Result<Vec<Goal>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM goals", GOAL_COLUMNS));
        qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
        if let Some(active) = active {
            qb.push(" AND active = ").push_bind(active);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_goal).collect()
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Option<Goal>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM goals WHERE id = ? AND user_id = ?",
            GOAL_COLUMNS
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_goal).transpose()
    }

    async fn insert(&self, user_id: Uuid, id: Option<Uuid>, req: CreateGoalRequest) -> Result<Goal> {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let ts = format_timestamp(now());

        sqlx::query(
            "INSERT INTO goals (id, user_id, category, description, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(&req.category)
        .bind(&req.description)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.fetch(user_id, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Goal {} vanished after insert", id)))
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateGoalRequest,
    ) -> Result<Option<Goal>> {
        if req.is_empty() {
            return self.fetch(user_id, id).await;
        }

        let result = sqlx::query(
            "UPDATE goals
             SET category = COALESCE(?, category),
                 description = COALESCE(?, description),
                 active = COALESCE(?, active),
                 updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(req.category)
        .bind(req.description)
        .bind(req.active)
        .bind(format_timestamp(now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch(user_id, id).await
    }

    async fn delete(&self, user_id: Uuid, id: Uuid, soft: bool) -> Result<bool> {
        let result = if soft {
            sqlx::query(
                "UPDATE goals SET active = 0, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(format_timestamp(now()))
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
        } else {
            sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
                .bind(id.to_string())
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await
        }
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_since(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Goal>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM goals", GOAL_COLUMNS));
        qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
        if let Some(since) = since {
            qb.push(" AND updated_at > ").push_bind(format_timestamp(since));
        }
        qb.push(" ORDER BY updated_at DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_goal).collect()
    }
}
