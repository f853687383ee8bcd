//! User repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use cognito_core::timestamp::{format_timestamp, now, parse_db_timestamp};
use cognito_core::{Error, Result, StoredRefreshToken, User, UserProfile, UserRepository};

use crate::parse_uuid;

const USER_COLUMNS: &str = "id, email, name, picture, created_at, last_login_at";

/// SQLite implementation of UserRepository.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new SqliteUserRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_row_to_user(row: &SqliteRow) -> Result<User> {
    let last_login: Option<String> = row.try_get("last_login_at").map_err(Error::Database)?;
    Ok(User {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(Error::Database)?)?,
        email: row.try_get("email").map_err(Error::Database)?,
        name: row.try_get("name").map_err(Error::Database)?,
        picture: row.try_get("picture").map_err(Error::Database)?,
        created_at: parse_db_timestamp(&row.try_get::<String, _>("created_at").map_err(Error::Database)?)?,
        last_login_at: last_login.as_deref().map(parse_db_timestamp).transpose()?,
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn upsert_by_email(&self, profile: &UserProfile) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, name, picture, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.picture)
        .bind(format_timestamp(now()))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            tracing::info!(
                subsystem = "database",
                component = "users",
                op = "create",
                "Created user"
            );
        }

        self.fetch_by_email(&profile.email)
            .await?
            .ok_or_else(|| Error::Internal(format!("User {} vanished after upsert", profile.email)))
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_user).transpose()
    }

    async fn fetch_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_user).transpose()
    }

    async fn update_last_login(&self, email: &str, profile: Option<&UserProfile>) -> Result<()> {
        sqlx::query(
            "UPDATE users
             SET last_login_at = ?,
                 name = COALESCE(?, name),
                 picture = COALESCE(?, picture)
             WHERE email = ?",
        )
        .bind(format_timestamp(now()))
        .bind(profile.and_then(|p| p.name.clone()))
        .bind(profile.and_then(|p| p.picture.clone()))
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        email: &str,
        token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token = ?, refresh_token_expires_at = ? WHERE email = ?",
        )
        .bind(token)
        .bind(expires_at.map(format_timestamp))
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch_refresh_token(&self, email: &str) -> Result<Option<StoredRefreshToken>> {
        let row = sqlx::query(
            "SELECT refresh_token, refresh_token_expires_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let token: Option<String> = row.try_get("refresh_token").map_err(Error::Database)?;
        let expires_at: Option<String> =
            row.try_get("refresh_token_expires_at").map_err(Error::Database)?;

        match token {
            Some(token) if !token.is_empty() => Ok(Some(StoredRefreshToken {
                token,
                expires_at: expires_at.as_deref().map(parse_db_timestamp).transpose()?,
            })),
            _ => Ok(None),
        }
    }
}
