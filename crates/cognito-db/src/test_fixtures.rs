//! Test fixtures for database integration tests.
//!
//! Every fixture database is an isolated in-memory SQLite instance with the
//! schema applied, so tests need no external services and never share state.
//!
//! ```rust,ignore
//! use cognito_db::test_fixtures::{test_database, create_test_user};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let db = test_database().await;
//!     let user = create_test_user(&db, "writer@example.com").await;
//!     // ...
//! }
//! ```

use crate::{Database, PoolConfig, User, UserProfile, UserRepository};

/// URL of a private in-memory database.
pub const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Open a fresh, migrated in-memory database.
pub async fn test_database() -> Database {
    let db = Database::connect_with_config(MEMORY_DATABASE_URL, PoolConfig::in_memory())
        .await
        .expect("Failed to open in-memory database");
    db.migrate().await.expect("Failed to run migrations");
    db
}

/// Insert a user with the given email.
pub async fn create_test_user(db: &Database, email: &str) -> User {
    db.users
        .upsert_by_email(&UserProfile {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            picture: None,
        })
        .await
        .expect("Failed to create test user")
}
