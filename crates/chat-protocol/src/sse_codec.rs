//! `text/event-stream` encoding/decoding for push events.
//!
//! Frame layout (one event):
//!
//! ```text
//! event:<name>\n
//! data:<line 1>\n
//! data:<line 2>\n      (one data line per payload line)
//! \n                   (blank line terminates the event)
//! ```
//!
//! Concretely, the two events of the contract are:
//!
//! ```text
//! event:connect
//! data:connected
//!
//! event:chat
//! data:{"id":1,"message":"hello"}
//!
//! ```
//!
//! The decoder side is incremental: feed it arbitrary chunks as they come
//! off the socket and pull complete frames out. It accepts `\r\n` line
//! endings, `:` comment lines and an optional space after the field colon,
//! so it also reads streams produced by other SSE servers.

use bytes::BytesMut;

use chat_core::{EventKind, Message, PushEvent};

use crate::body::ChatBody;
use crate::error::ProtocolError;
use crate::wire_types::{event_kind, event_name, CONNECT_DATA};

/// Default event name when a frame carries no `event:` field.
const DEFAULT_EVENT_NAME: &str = "message";

/// One decoded event: its name and its (joined) data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub name: String,
    pub data: String,
}

/// Encode a single event frame.
pub fn encode_frame(name: &str, data: &str) -> String {
    let mut out = String::with_capacity(name.len() + data.len() + 16);
    out.push_str("event:");
    out.push_str(name);
    out.push('\n');
    for line in data.split('\n') {
        out.push_str("data:");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Encode a push event into its wire frame.
pub fn encode_event(event: &PushEvent) -> Result<String, ProtocolError> {
    let data = match event {
        PushEvent::Connect => CONNECT_DATA.to_string(),
        PushEvent::Chat(message) => serde_json::to_string(&ChatBody::from(message))?,
    };
    Ok(encode_frame(event_name(event.kind()), &data))
}

/// Turn a decoded frame back into a push event.
pub fn decode_push_event(frame: &SseFrame) -> Result<PushEvent, ProtocolError> {
    match event_kind(&frame.name) {
        Some(EventKind::Connect) => Ok(PushEvent::Connect),
        Some(EventKind::Chat) => {
            let body: ChatBody = serde_json::from_str(&frame.data)?;
            Ok(PushEvent::Chat(Message::from(body)))
        }
        None => Err(ProtocolError::UnknownEvent(frame.name.clone())),
    }
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    name: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        SseDecoder::default()
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<SseFrame>, ProtocolError> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let mut line = &raw[..pos];
            if let Some((&b'\r', rest)) = line.split_last() {
                line = rest;
            }
            let line = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    return Ok(Some(frame));
                }
                continue;
            }
            self.field(line);
        }
        Ok(None)
    }

    fn field(&mut self, line: &str) {
        let (field, value) = match line.find(':') {
            Some(0) => return, // comment
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry carry nothing we act on.
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let name = self.name.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            name: name.unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
        })
    }
}

/// Decode every complete frame in `bytes`.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<SseFrame>, ProtocolError> {
    let mut decoder = SseDecoder::new();
    decoder.push(bytes);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        frames.push(frame);
    }
    Ok(frames)
}
