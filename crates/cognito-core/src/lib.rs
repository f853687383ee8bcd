//! # cognito-core
//!
//! Core types, traits, and abstractions for the Cognito journal backend.
//!
//! This crate provides the domain models, the shared error type, timestamp
//! handling used for last-write-wins sync, and the repository and generation
//! traits that the database and inference crates implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod sync;
pub mod timestamp;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use sync::{
    ChangeType, EntityKind, EntryChangeData, GoalChangeData, PendingChange, ServerChanges,
    SyncRequest, SyncResponse,
};
pub use timestamp::{format_timestamp, parse_iso_timestamp, should_apply_client_change};
pub use traits::*;
