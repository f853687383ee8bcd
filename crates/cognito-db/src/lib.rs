//! # cognito-db
//!
//! SQLite database layer for the Cognito journal backend.
//!
//! This crate provides:
//! - Connection pool management
//! - Embedded schema migrations
//! - Repository implementations for users, entries (with version history) and goals
//!
//! ## Example
//!
//! ```rust,ignore
//! use cognito_db::{Database, EntryRepository, CreateEntryRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://./data/journal.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let entry = db.entries.insert(user_id, None, CreateEntryRequest {
//!         date: "2024-12-30".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Created entry: {}", entry.id);
//!     Ok(())
//! }
//! ```

pub mod entries;
pub mod goals;
pub mod pool;
#[cfg(feature = "migrations")]
pub mod test_fixtures;
pub mod users;

pub use entries::SqliteEntryRepository;
pub use goals::SqliteGoalRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use users::SqliteUserRepository;

// Re-export core types for convenience
pub use cognito_core::*;

use uuid::Uuid;

/// Parse a UUID stored as TEXT.
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt id in store: {}", e)))
}

/// Combined database handle with all repositories.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::SqlitePool,
    /// User repository.
    pub users: SqliteUserRepository,
    /// Entry and entry version repository.
    pub entries: SqliteEntryRepository,
    /// Goal repository.
    pub goals: SqliteGoalRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            users: SqliteUserRepository::new(pool.clone()),
            entries: SqliteEntryRepository::new(pool.clone()),
            goals: SqliteGoalRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Check that the database answers a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
