use thiserror::Error;

/// Errors that can arise when encoding or decoding the event stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A `chat` body was not valid JSON of the expected shape.
    #[error("invalid chat body: {0}")]
    Json(#[from] serde_json::Error),

    /// A stream line was not valid UTF-8.
    #[error("event stream is not valid UTF-8")]
    InvalidUtf8,

    /// An event name outside the contract.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}
