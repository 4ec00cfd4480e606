//! Response body of a push connection.
//!
//! Drains the handle's channel and encodes each event with the wire codec.
//! When the channel ends (the handle was closed by the registry) the body
//! ends; when hyper drops the body (the client went away) the handle is
//! completed, which removes it from the registry.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use chat_core::{ConnectionHandle, PushEvent, Termination};
use chat_protocol::encode_event;

pub struct EventStream {
    rx: mpsc::Receiver<PushEvent>,
    handle: Arc<ConnectionHandle>,
}

impl EventStream {
    pub fn new(rx: mpsc::Receiver<PushEvent>, handle: Arc<ConnectionHandle>) -> Self {
        EventStream { rx, handle }
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                let frame = encode_event(&event)
                    .map(Bytes::from)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
                Poll::Ready(Some(frame))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.handle.terminate(Termination::Complete);
    }
}
