// crates/chat-client/src/main.rs

mod display;
mod network;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::network::ChatConnection;
use crate::types::ClientConfig;

#[derive(Parser)]
#[clap(name = "chat-client")]
#[clap(about = "Listen to and post into the live chat")]
struct Cli {
    /// Server base URL (overrides the config file)
    #[clap(short, long)]
    server: Option<String>,

    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print live messages until interrupted
    Listen,
    /// Post a message
    Send { text: String },
    /// Print stored messages, newest first
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.debug {
        tracing_subscriber::fmt()
            .with_env_filter("chat_client=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let mut connection = ChatConnection::new(&config.server_url, config.session, config.backoff);

    match cli.command {
        Command::Listen => {
            tokio::select! {
                result = connection.listen(|event| println!("{}", display::format_event(event, Local::now()))) => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            if let Some(session) = connection.session() {
                info!("Session was {}", session);
            }
        }
        Command::Send { text } => {
            let body = connection.send(&text).await?;
            println!("sent #{}", body.id);
        }
        Command::History => {
            let messages = connection.history().await?;
            println!("{}", display::format_history(&messages));
        }
    }

    Ok(())
}
