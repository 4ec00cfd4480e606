//! SSE push server for live chat.

use chat_server::config::Config;
use chat_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!(
        addr = %config.socket_addr_string(),
        max_clients = config.max_clients,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "starting chat-server"
    );

    server::run(config).await
}
