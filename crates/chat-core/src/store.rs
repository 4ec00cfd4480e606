//! Message store contract and an in-memory implementation.

use std::sync::Mutex;

use crate::error::StoreError;
use crate::event::Message;

/// Durable, append-only storage of chat messages.
///
/// Implementations assign ids that are unique and strictly increasing.
/// Calls may block; [`ChatService`](crate::ChatService) runs them on the
/// blocking pool.
pub trait MessageStore: Send + Sync {
    /// Persist `content` and return the stored message with its id.
    fn save(&self, content: &str) -> Result<Message, StoreError>;

    /// All messages, newest (highest id) first.
    fn list_all(&self) -> Result<Vec<Message>, StoreError>;
}

/// Process-local store. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl MessageStore for MemoryStore {
    fn save(&self, content: &str) -> Result<Message, StoreError> {
        let mut messages = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        let id = messages.last().map_or(1, |m| m.id + 1);
        let message = Message::new(id, content);
        messages.push(message.clone());
        Ok(message)
    }

    fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(messages.iter().rev().cloned().collect())
    }
}
