//! HTTP handlers for cognito-api.

pub mod auth;
pub mod chat;
pub mod entries;
pub mod goals;
pub mod health;
pub mod sync;
