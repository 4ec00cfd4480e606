//! Messages and push events.
//!
//! These are transport-agnostic logical types. The wire form (event names,
//! the JSON body, `text/event-stream` framing) lives in the
//! `chat-protocol` crate.

/// A persisted chat message.
///
/// Produced by a [`MessageStore`](crate::MessageStore); the `id` is
/// assigned by the store, unique and increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub content: String,
}

impl Message {
    pub fn new(id: i64, content: impl Into<String>) -> Self {
        Message {
            id,
            content: content.into(),
        }
    }
}

/// Kind of a push event, independent of its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Initial keep-alive handshake.
    Connect,
    /// A new chat message.
    Chat,
}

/// One server-initiated event pushed down a connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Sent once, right after registration, so the client's reconnect
    /// logic never sees an idle stream.
    Connect,

    /// A message that has already been committed to the store.
    Chat(Message),
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::Connect => EventKind::Connect,
            PushEvent::Chat(_) => EventKind::Chat,
        }
    }
}
