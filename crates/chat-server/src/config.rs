//! Configuration for the chat server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `CHAT_BIND_ADDR`          (default: "0.0.0.0")
//! - `CHAT_PORT`               (default: "8080")
//! - `CHAT_MAX_CLIENTS`        (default: "1024")
//! - `CHAT_IDLE_TIMEOUT_SECS`  (default: "60")
//! - `CHAT_SEND_TIMEOUT_MS`    (default: "5000")
//! - `CHAT_CHANNEL_CAPACITY`   (default: "64")
//! - `CHAT_DATABASE_PATH`      (default: unset, messages kept in memory)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chat_core::RegistryConfig;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. `0` picks a free port.
    pub port: u16,

    /// Maximum number of simultaneously connected push clients.
    pub max_clients: usize,

    /// Idle window before a push connection times out.
    pub idle_timeout: Duration,

    /// Deadline for a single event delivery to one client.
    pub send_timeout: Duration,

    /// Events that may queue for one slow client.
    pub channel_capacity: usize,

    /// SQLite file for messages; `None` keeps them in memory.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            max_clients: 1024,
            idle_timeout: chat_core::DEFAULT_IDLE_TIMEOUT,
            send_timeout: chat_core::DEFAULT_SEND_TIMEOUT,
            channel_capacity: 64,
            database_path: None,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();

        let bind_addr = lookup("CHAT_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_or_default(&lookup, "CHAT_PORT", defaults.port)?;
        let max_clients = read_or_default(&lookup, "CHAT_MAX_CLIENTS", defaults.max_clients)?;
        let idle_secs = read_or_default(
            &lookup,
            "CHAT_IDLE_TIMEOUT_SECS",
            defaults.idle_timeout.as_secs(),
        )?;
        let send_ms = read_or_default(
            &lookup,
            "CHAT_SEND_TIMEOUT_MS",
            defaults.send_timeout.as_millis() as u64,
        )?;
        let channel_capacity =
            read_or_default(&lookup, "CHAT_CHANNEL_CAPACITY", defaults.channel_capacity)?;
        let database_path = lookup("CHAT_DATABASE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        if idle_secs == 0 {
            anyhow::bail!("CHAT_IDLE_TIMEOUT_SECS must be greater than zero");
        }
        if channel_capacity == 0 {
            anyhow::bail!("CHAT_CHANNEL_CAPACITY must be greater than zero");
        }

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            idle_timeout: Duration::from_secs(idle_secs),
            send_timeout: Duration::from_millis(send_ms),
            channel_capacity,
            database_path,
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Timing knobs for the connection registry.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            idle_timeout: self.idle_timeout,
            send_timeout: self.send_timeout,
        }
    }
}

fn read_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {val:?}")),
        None => Ok(default),
    }
}
