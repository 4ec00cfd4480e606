//! Connection handles and their lifecycle state machine.
//!
//! ```text
//!        complete                 (sink closed,
//! Open ───────────▶ Completed ─┐   registry hook run)
//!   │    timeout                │
//!   ├─────────────▶ TimedOut  ──┤
//!   │    error                  ├──────────────▶ Closed
//!   ├─────────────▶ Errored   ──┤
//!   │    supersede              │
//!   └─────────────▶ Superseded ─┘
//! ```
//!
//! Only `Open` has outgoing transitions, and the move out of `Open` is a
//! compare-and-swap: whichever trigger wins performs the teardown, every
//! other trigger (from the transport runtime, the broadcast loop, the idle
//! watchdog or a newer registration) is a no-op. This is what lets those
//! callers race on the same handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::event::PushEvent;
use crate::sink::EventSink;
use crate::types::{next_handle_id, ClientId, HandleId};

/// Lifecycle state of a [`ConnectionHandle`].
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandleState {
    Open = 0,
    Completed = 1,
    TimedOut = 2,
    Errored = 3,
    Superseded = 4,
    Closed = 5,
}

/// An event that ends a handle's life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The stream finished normally (client went away, server shutdown).
    Complete,
    /// No server-initiated event within the idle window.
    Timeout,
    /// A send failed or missed its deadline.
    Error,
    /// A newer handle was registered for the same client.
    Supersede,
}

impl HandleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => HandleState::Open,
            1 => HandleState::Completed,
            2 => HandleState::TimedOut,
            3 => HandleState::Errored,
            4 => HandleState::Superseded,
            _ => HandleState::Closed,
        }
    }

    /// Transition table. `None` means the trigger is ignored in this state.
    pub fn on(self, trigger: Termination) -> Option<HandleState> {
        match (self, trigger) {
            (HandleState::Open, Termination::Complete) => Some(HandleState::Completed),
            (HandleState::Open, Termination::Timeout) => Some(HandleState::TimedOut),
            (HandleState::Open, Termination::Error) => Some(HandleState::Errored),
            (HandleState::Open, Termination::Supersede) => Some(HandleState::Superseded),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self == HandleState::Open
    }
}

/// Outcome of a delivery attempt that did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The sink accepted the event.
    Sent,
    /// The handle was already terminating; nothing was attempted.
    Skipped,
}

type TerminationHook = Box<dyn Fn(&ConnectionHandle) + Send + Sync>;

/// One live push channel to one client.
pub struct ConnectionHandle {
    id: HandleId,
    client_id: ClientId,
    sink: Box<dyn EventSink>,
    state: AtomicU8,
    created_at: Instant,
    /// Milliseconds after `created_at` of the last server-initiated event.
    last_event_ms: AtomicU64,
    on_terminate: OnceLock<TerminationHook>,
    terminated: Notify,
}

impl ConnectionHandle {
    pub fn new(client_id: ClientId, sink: Box<dyn EventSink>) -> Self {
        ConnectionHandle {
            id: next_handle_id(),
            client_id,
            sink,
            state: AtomicU8::new(HandleState::Open as u8),
            created_at: Instant::now(),
            last_event_ms: AtomicU64::new(0),
            on_terminate: OnceLock::new(),
            terminated: Notify::new(),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Instant of the last server-initiated event (creation if none yet).
    pub fn last_event_at(&self) -> Instant {
        self.created_at + Duration::from_millis(self.last_event_ms.load(Ordering::Relaxed))
    }

    /// Install the hook run after the sink is closed. Returns `false` if a
    /// hook was already installed, i.e. the handle is already registered.
    pub(crate) fn install_hook(&self, hook: TerminationHook) -> bool {
        self.on_terminate.set(hook).is_ok()
    }

    /// Apply a terminal trigger.
    ///
    /// Returns `true` if this call performed the teardown, `false` if the
    /// handle was already terminating or closed.
    pub fn terminate(&self, trigger: Termination) -> bool {
        let mut current = self.state();
        let next = loop {
            let Some(next) = current.on(trigger) else {
                return false;
            };
            match self.state.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break next,
                Err(actual) => current = HandleState::from_u8(actual),
            }
        };

        match next {
            HandleState::Errored => {
                warn!(client_id = %self.client_id, handle = %self.id, "connection errored")
            }
            HandleState::TimedOut => {
                info!(client_id = %self.client_id, handle = %self.id, "connection timed out")
            }
            HandleState::Superseded => {
                info!(client_id = %self.client_id, handle = %self.id, "connection superseded")
            }
            _ => info!(client_id = %self.client_id, handle = %self.id, "connection completed"),
        }

        self.sink.close();
        if let Some(hook) = self.on_terminate.get() {
            hook(self);
        }
        self.state.store(HandleState::Closed as u8, Ordering::Release);
        self.terminated.notify_waiters();
        true
    }

    /// Push one event, bounded by `send_timeout`.
    ///
    /// A failed or late send terminates the handle with
    /// [`Termination::Error`] before the error is returned.
    pub async fn deliver(
        &self,
        event: &PushEvent,
        send_timeout: Duration,
    ) -> Result<Delivery, ChatError> {
        if !self.is_open() {
            return Ok(Delivery::Skipped);
        }

        match tokio::time::timeout(send_timeout, self.sink.send(event)).await {
            Ok(Ok(())) => {
                self.touch();
                debug!(client_id = %self.client_id, handle = %self.id, kind = ?event.kind(), "event delivered");
                Ok(Delivery::Sent)
            }
            Ok(Err(err)) => {
                warn!(client_id = %self.client_id, handle = %self.id, error = %err, "send failed");
                self.terminate(Termination::Error);
                Err(ChatError::TransportClosed)
            }
            Err(_) => {
                warn!(
                    client_id = %self.client_id,
                    handle = %self.id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "send timed out"
                );
                self.terminate(Termination::Error);
                Err(ChatError::Timeout)
            }
        }
    }

    fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        self.last_event_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Terminate with [`Termination::Timeout`] once `idle_timeout` passes
    /// without a server-initiated event. Returns when the handle closes.
    pub(crate) async fn watch_idle(self: Arc<Self>, idle_timeout: Duration) {
        loop {
            if !self.is_open() {
                return;
            }

            let deadline = self.last_event_at() + idle_timeout;
            if Instant::now() >= deadline {
                self.terminate(Termination::Timeout);
                return;
            }

            tokio::select! {
                _ = self.terminated.notified() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("state", &self.state())
            .finish()
    }
}
