//! Identity types shared by the registry and its callers.
//!
//! - [`ClientId`]: the stable key of one client session
//! - [`HandleId`]: the process-unique identity of one connection handle

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ChatError;

/// Identifier of a client session.
///
/// Stable for the lifetime of the session (a browser tab reconnecting
/// after a refresh keeps the same id) and distinct across sessions.
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Validate a raw identity.
    ///
    /// Empty or whitespace-only strings are rejected with
    /// [`ChatError::InvalidIdentity`].
    pub fn new(raw: impl Into<String>) -> Result<Self, ChatError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ChatError::InvalidIdentity);
        }
        Ok(ClientId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one connection handle.
///
/// Two handles registered for the same [`ClientId`] always have different
/// `HandleId`s; the registry compares these, never client ids, when it
/// removes a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_handle_id() -> HandleId {
    HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_identity() {
        assert_eq!(ClientId::new(""), Err(ChatError::InvalidIdentity));
        assert_eq!(ClientId::new("   "), Err(ChatError::InvalidIdentity));
    }

    #[test]
    fn keeps_identity_verbatim() {
        let id = ClientId::new("9C1F-session").unwrap();
        assert_eq!(id.as_str(), "9C1F-session");
        assert_eq!(id.to_string(), "9C1F-session");
    }

    #[test]
    fn handle_ids_are_unique() {
        let a = next_handle_id();
        let b = next_handle_id();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
