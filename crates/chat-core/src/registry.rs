//! Live connection registry.
//!
//! Holds at most one handle per [`ClientId`]. The registry is an explicitly
//! constructed value (create one per process, clone it into whatever needs
//! it); clones share the same map.
//!
//! Removal is always compare-and-remove on [`HandleId`]: a superseded
//! handle whose termination fires late can never evict the handle that
//! replaced it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::ChatError;
use crate::event::PushEvent;
use crate::handle::{ConnectionHandle, Delivery, Termination};
use crate::sink::EventSink;
use crate::types::{ClientId, HandleId};

/// Idle window after which a handle with no server-initiated event times out.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for a single send to one handle.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing knobs shared by the registry and the broadcast engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub idle_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

type HandleMap = DashMap<ClientId, Arc<ConnectionHandle>>;

/// Registry of live push connections, keyed by client identity.
#[derive(Clone)]
pub struct ConnectionRegistry {
    handles: Arc<HandleMap>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        ConnectionRegistry {
            handles: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Register a freshly created handle under its client id.
    ///
    /// Any handle previously stored for the same client is displaced and
    /// terminated with [`Termination::Supersede`]. The new handle gets the
    /// registry removal hook and an idle-timeout watchdog. Outside a Tokio
    /// runtime the watchdog cannot be spawned; the handle is still
    /// registered but never idles out.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> Arc<ConnectionHandle> {
        let client_id = handle.client_id().clone();

        let map: Weak<HandleMap> = Arc::downgrade(&self.handles);
        let installed = handle.install_hook(Box::new(move |h: &ConnectionHandle| {
            if let Some(map) = map.upgrade() {
                remove_if_current(&map, h.client_id(), h.id());
            }
        }));
        if !installed {
            warn!(client_id = %client_id, handle = %handle.id(), "handle already registered");
            return handle;
        }

        // The displaced handle is closed right after the swap; taking it from
        // `insert` (rather than a separate lookup) means concurrent adds for
        // one client can never leave a displaced handle open.
        if let Some(previous) = self.handles.insert(client_id.clone(), Arc::clone(&handle)) {
            if previous.id() != handle.id() {
                previous.terminate(Termination::Supersede);
                info!(
                    client_id = %client_id,
                    previous = %previous.id(),
                    handle = %handle.id(),
                    "previous connection replaced"
                );
            }
        }

        // Terminated between hook install and insert: its hook already ran
        // against the old map contents.
        if !handle.is_open() {
            remove_if_current(&self.handles, &client_id, handle.id());
            return handle;
        }

        info!(
            client_id = %client_id,
            handle = %handle.id(),
            connections = self.handles.len(),
            "connection registered"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(Arc::clone(&handle).watch_idle(self.config.idle_timeout));
            }
            Err(_) => warn!(
                client_id = %client_id,
                handle = %handle.id(),
                "no runtime, idle timeout disabled"
            ),
        }
        handle
    }

    /// Remove the mapping for `client_id` only if it still points at `handle`.
    pub fn remove(&self, client_id: &ClientId, handle: &ConnectionHandle) -> bool {
        remove_if_current(&self.handles, client_id, handle.id())
    }

    /// Create a handle over `sink`, send the `connect` keep-alive and
    /// register it.
    ///
    /// The keep-alive goes out before the handle is visible to
    /// [`snapshot`](Self::snapshot), so it is always the first event on the
    /// transport. If it cannot be sent the handle is closed, never
    /// registered, and [`ChatError::TransportClosed`] (or
    /// [`ChatError::Timeout`]) returned.
    pub async fn open_connection<S>(
        &self,
        client_id: ClientId,
        sink: S,
    ) -> Result<Arc<ConnectionHandle>, ChatError>
    where
        S: EventSink + 'static,
    {
        let handle = Arc::new(ConnectionHandle::new(client_id, Box::new(sink)));

        match handle
            .deliver(&PushEvent::Connect, self.config.send_timeout)
            .await?
        {
            Delivery::Sent => Ok(self.add(handle)),
            Delivery::Skipped => Err(ChatError::TransportClosed),
        }
    }

    /// Current handle for `client_id`, if any.
    pub fn get(&self, client_id: &ClientId) -> Option<Arc<ConnectionHandle>> {
        self.handles.get(client_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Copy of the live handles. The map is only locked while copying.
    pub fn snapshot(&self) -> Vec<(ClientId, Arc<ConnectionHandle>)> {
        self.handles
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Complete every live handle. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let closed = self
            .snapshot()
            .into_iter()
            .filter(|(_, handle)| handle.terminate(Termination::Complete))
            .count();
        info!(closed, "closed all connections");
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        ConnectionRegistry::new(RegistryConfig::default())
    }
}

fn remove_if_current(map: &HandleMap, client_id: &ClientId, id: HandleId) -> bool {
    map.remove_if(client_id, |_, current| current.id() == id)
        .is_some()
}
