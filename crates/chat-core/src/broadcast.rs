//! Broadcast engine.
//!
//! Delivers one message to every live handle. The registry is only locked
//! while the snapshot is copied; each send happens outside that critical
//! section, one handle after another.
//!
//! A failing handle is terminated (which removes it from the registry) and
//! recorded in the [`BroadcastReport`]; delivery to the remaining handles
//! carries on. Nothing here ever returns an error to the caller.

use tracing::{debug, warn};

use crate::error::ChatError;
use crate::event::{Message, PushEvent};
use crate::handle::Delivery;
use crate::registry::ConnectionRegistry;
use crate::types::ClientId;

/// Outcome of one [`Broadcaster::send_all`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Handles in the snapshot.
    pub attempted: usize,
    /// Handles that accepted the event.
    pub delivered: usize,
    /// Handles already terminating when the loop reached them.
    pub skipped: usize,
    /// Handles that failed and were dropped.
    pub failures: Vec<(ClientId, ChatError)>,
}

impl BroadcastReport {
    /// `true` if no handle failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pushes committed messages to every live connection.
#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Broadcaster { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Deliver `message` as a `chat` event to every live handle.
    pub async fn send_all(&self, message: &Message) -> BroadcastReport {
        let targets = self.registry.snapshot();
        let send_timeout = self.registry.config().send_timeout;
        let event = PushEvent::Chat(message.clone());

        let mut report = BroadcastReport {
            attempted: targets.len(),
            ..Default::default()
        };

        for (client_id, handle) in targets {
            match handle.deliver(&event, send_timeout).await {
                Ok(Delivery::Sent) => report.delivered += 1,
                Ok(Delivery::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(
                        client_id = %client_id,
                        handle = %handle.id(),
                        message_id = message.id,
                        error = %err,
                        "dropping connection after failed delivery"
                    );
                    report.failures.push((client_id, err));
                }
            }
        }

        debug!(
            message_id = message.id,
            attempted = report.attempted,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failures.len(),
            "broadcast finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::handle::{ConnectionHandle, HandleState, Termination};
    use crate::registry::RegistryConfig;
    use crate::sink::ChannelSink;

    fn client(id: &str) -> ClientId {
        ClientId::new(id).unwrap()
    }

    #[tokio::test]
    async fn empty_registry_is_a_clean_noop() {
        let broadcaster = Broadcaster::new(ConnectionRegistry::default());
        let report = broadcaster.send_all(&Message::new(1, "hi")).await;

        assert_eq!(report, BroadcastReport::default());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn delivers_to_every_live_handle() {
        let registry = ConnectionRegistry::default();
        let mut receivers = Vec::new();
        for i in 0..5 {
            let (sink, mut rx) = ChannelSink::new(8);
            registry
                .open_connection(client(&format!("c{i}")), sink)
                .await
                .unwrap();
            assert_eq!(rx.recv().await, Some(PushEvent::Connect));
            receivers.push(rx);
        }

        let message = Message::new(7, "hello");
        let report = Broadcaster::new(registry.clone()).send_all(&message).await;

        assert_eq!(report.attempted, 5);
        assert_eq!(report.delivered, 5);
        assert!(report.is_clean());
        for rx in &mut receivers {
            assert_eq!(rx.recv().await, Some(PushEvent::Chat(message.clone())));
        }
    }

    #[tokio::test]
    async fn failing_handle_is_isolated_and_removed() {
        let registry = ConnectionRegistry::default();
        let mut live = Vec::new();
        for i in 0..4 {
            let (sink, rx) = ChannelSink::new(8);
            registry
                .open_connection(client(&format!("ok{i}")), sink)
                .await
                .unwrap();
            live.push(rx);
        }

        let (sink, rx) = ChannelSink::new(8);
        let broken = registry.open_connection(client("broken"), sink).await.unwrap();
        drop(rx);

        let report = Broadcaster::new(registry.clone())
            .send_all(&Message::new(1, "x"))
            .await;

        assert_eq!(report.attempted, 5);
        assert_eq!(report.delivered, 4);
        assert_eq!(
            report.failures,
            vec![(client("broken"), ChatError::TransportClosed)]
        );
        assert_eq!(broken.state(), HandleState::Closed);
        assert_eq!(registry.len(), 4);
        assert!(registry.get(&client("broken")).is_none());
    }

    #[tokio::test]
    async fn terminating_handle_is_skipped() {
        let registry = ConnectionRegistry::default();
        let (sink, _rx) = ChannelSink::new(8);
        let handle = Arc::new(ConnectionHandle::new(client("c"), Box::new(sink)));
        registry.add(handle.clone());

        // Terminated after the snapshot was taken.
        let snapshot = registry.snapshot();
        handle.terminate(Termination::Complete);

        let mut report = BroadcastReport::default();
        for (_, h) in snapshot {
            match h.deliver(&PushEvent::Connect, Duration::from_secs(1)).await {
                Ok(Delivery::Skipped) => report.skipped += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_times_out_without_blocking_others() {
        let registry = ConnectionRegistry::new(RegistryConfig {
            send_timeout: Duration::from_millis(200),
            ..Default::default()
        });

        // Capacity 1 is already filled by the keep-alive and never drained.
        let (sink, _stalled_rx) = ChannelSink::new(1);
        registry.open_connection(client("stalled"), sink).await.unwrap();

        let (sink, mut healthy_rx) = ChannelSink::new(8);
        registry.open_connection(client("healthy"), sink).await.unwrap();
        assert_eq!(healthy_rx.recv().await, Some(PushEvent::Connect));

        let message = Message::new(3, "late");
        let report = Broadcaster::new(registry.clone()).send_all(&message).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures, vec![(client("stalled"), ChatError::Timeout)]);
        assert_eq!(healthy_rx.recv().await, Some(PushEvent::Chat(message)));
        assert!(registry.get(&client("stalled")).is_none());
    }
}
