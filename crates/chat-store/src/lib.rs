//! chat-store
//!
//! Durable [`MessageStore`](chat_core::MessageStore) backed by SQLite.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
