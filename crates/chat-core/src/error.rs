//! Error types for the chat core.
//!
//! [`ChatError`] is the taxonomy seen by callers of the registry, the
//! broadcast engine and the write path. Per-connection faults
//! (`TransportClosed`, `Timeout`) are recovered inside the core and only
//! ever show up as *data* in a [`BroadcastReport`](crate::BroadcastReport);
//! `PersistenceFailure` is the only one that fails a write.

use thiserror::Error;

/// Errors produced by the chat core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Empty or missing client identity on connect.
    #[error("client identity must not be empty")]
    InvalidIdentity,

    /// Empty message content on submit.
    #[error("message content must not be empty")]
    InvalidMessage,

    /// The underlying channel of a handle is gone.
    #[error("transport closed")]
    TransportClosed,

    /// A delivery did not complete within the send deadline.
    #[error("delivery timed out")]
    Timeout,

    /// The message store rejected the write.
    #[error("failed to persist message: {0}")]
    PersistenceFailure(#[from] StoreError),
}

/// Errors reported by a [`MessageStore`](crate::MessageStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    /// A previous holder of the store lock panicked.
    #[error("store lock poisoned")]
    Poisoned,

    /// The blocking task running the store call did not complete.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Errors reported by an [`EventSink`](crate::EventSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The receiving side of the transport has gone away.
    #[error("sink closed")]
    Closed,

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}
