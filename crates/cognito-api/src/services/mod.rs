//! Service layer for business logic.

pub mod chat_service;
pub mod sync_service;

pub use chat_service::ChatService;
pub use sync_service::SyncService;
