//! chat-protocol
//!
//! Wire-level encoding/decoding for the chat push server.
//!
//! This crate turns logical push events (`chat_core::PushEvent`) into
//! `text/event-stream` frames and back again, and defines the JSON bodies
//! exchanged over HTTP.
//!
//! - [`sse_codec`]  : event-stream framing (server encoder, client decoder)
//! - [`body`]       : `{"id","message"}` and request bodies
//! - [`wire_types`] : event names and other fixed strings

pub mod body;
pub mod error;
pub mod sse_codec;
pub mod wire_types;

pub use body::{ChatBody, ChatRequest};
pub use error::ProtocolError;
pub use sse_codec::{decode_all, decode_push_event, encode_event, encode_frame, SseDecoder, SseFrame};
pub use wire_types::{CONNECT_DATA, EVENT_CHAT, EVENT_CONNECT, EVENT_STREAM_CONTENT_TYPE};
