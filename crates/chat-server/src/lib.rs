//! chat-server
//!
//! HTTP server that pushes live chat messages to browsers over
//! server-sent events.

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod types;

// these are internal modules, not re-exported
mod routes;
mod stream;
