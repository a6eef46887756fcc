//! # Storage Module
//!
//! SQLite-backed persistence for the chat core.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Services                   │
//! │  directory · requests · graph · messages    │
//! └──────────────────────┬──────────────────────┘
//!                        │ record structs
//! ┌──────────────────────▼──────────────────────┐
//! │                  Database                   │
//! │   Arc<Mutex<Connection>> + typed queries    │
//! └──────────────────────┬──────────────────────┘
//!                        │ SQL
//! ┌──────────────────────▼──────────────────────┐
//! │               SQLite (schema)               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The services never touch SQL directly; everything goes through the
//! [`Database`] methods, which return plain record structs.

mod database;
mod schema;

pub use database::{
    Database, FriendRequestRecord, FriendshipRecord, MessageRecord, ReadMarkerRecord, UserRecord,
};
pub use schema::SCHEMA_VERSION;
