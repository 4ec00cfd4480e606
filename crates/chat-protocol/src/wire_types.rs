//! Wire-level names and constants.
//!
//! Clients match on these strings, so they are part of the public
//! contract and must not change.

use chat_core::EventKind;

/// Event name of the initial keep-alive.
pub const EVENT_CONNECT: &str = "connect";

/// Event name of a new chat message.
pub const EVENT_CHAT: &str = "chat";

/// Plain-text payload of the `connect` event.
pub const CONNECT_DATA: &str = "connected";

/// Media type of the push stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Wire name for an event kind.
pub fn event_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Connect => EVENT_CONNECT,
        EventKind::Chat => EVENT_CHAT,
    }
}

/// Event kind for a wire name (case-sensitive).
pub fn event_kind(name: &str) -> Option<EventKind> {
    match name {
        EVENT_CONNECT => Some(EventKind::Connect),
        EVENT_CHAT => Some(EventKind::Chat),
        _ => None,
    }
}
