//! Transport sinks.
//!
//! An [`EventSink`] is the server-to-client half of one push connection.
//! The core never touches sockets; the ingress layer hands it a sink and
//! owns whatever actually writes bytes.
//!
//! [`ChannelSink`] is the sink every transport in this workspace uses: a
//! bounded mpsc channel whose receiver is drained by the HTTP response
//! body. Closing the sink drops the sender, which ends the receiver and
//! therefore the response.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::event::PushEvent;

/// The server-to-client half of a push connection.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Push one event. May wait on backpressure.
    async fn send(&self, event: &PushEvent) -> Result<(), SinkError>;

    /// Close the transport. Must be idempotent.
    fn close(&self);
}

/// Channel-backed sink.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<PushEvent>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport should drain.
    ///
    /// `capacity` bounds how many events may queue for a slow client
    /// before `send` starts waiting.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = ChannelSink {
            tx: Mutex::new(Some(tx)),
        };
        (sink, rx)
    }

    /// `true` once [`close`](EventSink::close) has run or the receiver
    /// has been dropped.
    pub fn is_closed(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.as_ref().map_or(true, |tx| tx.is_closed()),
            Err(_) => true,
        }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: &PushEvent) -> Result<(), SinkError> {
        let tx = match self.tx.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(tx) = tx else {
            return Err(SinkError::Closed);
        };

        let permit = tx.reserve().await.map_err(|_| SinkError::Closed)?;

        // Nothing is queued once `close` has returned, even if this send
        // was already waiting for capacity.
        let guard = self.tx.lock().map_err(|_| SinkError::Closed)?;
        if guard.is_none() {
            return Err(SinkError::Closed);
        }
        permit.send(event.clone());
        drop(guard);
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::event::Message;

    #[tokio::test]
    async fn forwards_events_until_closed() {
        let (sink, mut rx) = ChannelSink::new(4);

        sink.send(&PushEvent::Connect).await.unwrap();
        assert_eq!(rx.recv().await, Some(PushEvent::Connect));

        sink.close();
        assert!(sink.is_closed());
        assert_eq!(rx.recv().await, None);
        assert_eq!(sink.send(&PushEvent::Connect).await, Err(SinkError::Closed));
    }

    #[tokio::test]
    async fn dropped_receiver_fails_sends() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);

        assert!(sink.is_closed());
        assert_eq!(sink.send(&PushEvent::Connect).await, Err(SinkError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let (sink, _rx) = ChannelSink::new(1);
        sink.close();
        sink.close();
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn close_while_waiting_for_capacity_drops_the_event() {
        let (sink, mut rx) = ChannelSink::new(1);
        let sink = Arc::new(sink);
        sink.send(&PushEvent::Connect).await.unwrap();

        let pending = {
            let sink = sink.clone();
            tokio::spawn(async move {
                sink.send(&PushEvent::Chat(Message::new(1, "late"))).await
            })
        };
        tokio::task::yield_now().await;

        sink.close();
        assert_eq!(rx.recv().await, Some(PushEvent::Connect));
        assert_eq!(pending.await.unwrap(), Err(SinkError::Closed));
        assert_eq!(rx.recv().await, None);
    }
}
