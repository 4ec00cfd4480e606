//! chat-core
//!
//! Transport-agnostic core of the chat push server:
//! - connection handles and their lifecycle state machine
//! - the live connection registry (one handle per client)
//! - the broadcast engine
//! - the message store contract and the persist-then-broadcast write path

pub mod broadcast;
pub mod error;
pub mod event;
pub mod handle;
pub mod registry;
pub mod service;
pub mod sink;
pub mod store;
pub mod types;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use error::{ChatError, SinkError, StoreError};
pub use event::{EventKind, Message, PushEvent};
pub use handle::{ConnectionHandle, Delivery, HandleState, Termination};
pub use registry::{ConnectionRegistry, RegistryConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_SEND_TIMEOUT};
pub use service::ChatService;
pub use sink::{ChannelSink, EventSink};
pub use store::{MemoryStore, MessageStore};
pub use types::{ClientId, HandleId};
