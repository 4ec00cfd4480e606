//! JSON bodies.
//!
//! [`ChatBody`] is both the `data` of a `chat` event and the shape the
//! HTTP routes answer with: `{"id": <integer>, "message": <string>}`.

use serde::{Deserialize, Serialize};

use chat_core::Message;

/// Serialized chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBody {
    pub id: i64,
    pub message: String,
}

impl From<&Message> for ChatBody {
    fn from(m: &Message) -> Self {
        ChatBody {
            id: m.id,
            message: m.content.clone(),
        }
    }
}

impl From<ChatBody> for Message {
    fn from(b: ChatBody) -> Self {
        Message::new(b.id, b.message)
    }
}

/// Request body of a new message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}
