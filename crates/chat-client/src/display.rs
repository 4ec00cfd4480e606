// crates/chat-client/src/display.rs

use chrono::{DateTime, Local};

use chat_core::PushEvent;
use chat_protocol::ChatBody;

/// One line for a live event, stamped with its arrival time.
pub fn format_event(event: &PushEvent, at: DateTime<Local>) -> String {
    let stamp = at.format("%H:%M:%S");
    match event {
        PushEvent::Connect => format!("[{stamp}] -- connected --"),
        PushEvent::Chat(message) => format!("[{stamp}] #{} {}", message.id, message.content),
    }
}

/// Stored history, one message per line, in the order given.
pub fn format_history(messages: &[ChatBody]) -> String {
    if messages.is_empty() {
        return "(no messages)".to_string();
    }
    messages
        .iter()
        .map(|m| format!("#{} {}", m.id, m.message))
        .collect::<Vec<_>>()
        .join("\n")
}
