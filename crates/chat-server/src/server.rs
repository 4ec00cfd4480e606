//! HTTP listener and top-level server wiring.
//!
//! This module:
//! - Builds the process-wide `ConnectionRegistry` and `ChatService`.
//! - Picks the message store (SQLite when a path is configured).
//! - Binds the listener and serves the router until shutdown.
//! - Closes every push connection on the way out.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::info;

use chat_core::{ChatService, ConnectionRegistry, MemoryStore, MessageStore};
use chat_store::SqliteStore;

use crate::config::Config;
use crate::routes;
use crate::types::AppState;

/// Build the shared state for `config`.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn MessageStore> = match &config.database_path {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("opening message store at {}", path.display()))?;
            info!(path = %path.display(), "using sqlite message store");
            Arc::new(store)
        }
        None => {
            info!("using in-memory message store");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = ConnectionRegistry::new(config.registry_config());
    let service = Arc::new(ChatService::new(store, registry.clone()));

    Ok(AppState {
        service,
        registry,
        config: Arc::new(config),
        admission: Arc::new(Mutex::new(())),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chats/connect", get(routes::connect))
        .route("/chats", get(routes::list).post(routes::submit))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A running server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub registry: ConnectionRegistry,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Stop accepting requests, close every push connection and wait for
    /// the server task to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.context("server task panicked")??;
        Ok(())
    }
}

/// Bind and serve in the background.
pub async fn start(config: Config) -> anyhow::Result<ServerHandle> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let local = listener.local_addr()?;

    let state = build_state(config)?;
    let registry = state.registry.clone();
    let app = build_router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let closer = registry.clone();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                // Open streams would otherwise hold graceful shutdown forever.
                closer.close_all();
            })
            .await
    });

    info!(addr = %local, "listening");

    Ok(ServerHandle {
        addr: local,
        registry,
        shutdown: shutdown_tx,
        task,
    })
}

/// Run the server until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let server = start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");

    server.shutdown().await
}
