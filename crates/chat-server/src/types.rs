//! Shared types for the chat server.

use std::sync::Arc;

use chat_core::{ChatService, ConnectionRegistry};
use tokio::sync::Mutex;

use crate::config::Config;

/// Application state shared across all handlers.
///
/// The registry is created once per process in [`crate::server`] and
/// handed to everything that needs it; `service` holds a clone of the same
/// registry for broadcasting.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub registry: ConnectionRegistry,
    pub config: Arc<Config>,
    /// Held across the `max_clients` check and registration.
    pub admission: Arc<Mutex<()>>,
}
