//! Write path: persist, then broadcast.
//!
//! A submitted message is committed to the [`MessageStore`] first and only
//! then handed to the [`Broadcaster`], so a client that reads the store
//! after a push always finds the message. The commit and the broadcast
//! run under one sequencing lock, which makes the order of `chat` events
//! on every connection the order in which writes committed.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::broadcast::Broadcaster;
use crate::error::{ChatError, StoreError};
use crate::event::Message;
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Entry point for writers and readers of chat messages.
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    broadcaster: Broadcaster,
    sequencer: Mutex<()>,
}

impl ChatService {
    pub fn new(store: Arc<dyn MessageStore>, registry: ConnectionRegistry) -> Self {
        ChatService {
            store,
            broadcaster: Broadcaster::new(registry),
            sequencer: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.broadcaster.registry()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Persist `content` and push it to every live connection.
    ///
    /// Fails only on invalid content or a store error; in the latter case
    /// nothing is broadcast. Delivery failures are logged and otherwise
    /// ignored.
    pub async fn submit_message(&self, content: &str) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::InvalidMessage);
        }

        let _turn = self.sequencer.lock().await;

        let content = content.to_owned();
        let message = self
            .run_store(move |store| store.save(&content))
            .await
            .map_err(|err| {
                error!(error = %err, "failed to persist message");
                ChatError::PersistenceFailure(err)
            })?;

        let report = self.broadcaster.send_all(&message).await;
        if !report.is_clean() {
            warn!(
                message_id = message.id,
                failed = report.failures.len(),
                delivered = report.delivered,
                "broadcast dropped connections"
            );
        }

        info!(message_id = message.id, recipients = report.delivered, "message submitted");
        Ok(message)
    }

    /// Every stored message, newest first.
    pub async fn list_messages(&self) -> Result<Vec<Message>, ChatError> {
        self.run_store(|store| store.list_all())
            .await
            .map_err(ChatError::PersistenceFailure)
    }

    async fn run_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn MessageStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?
    }
}
