// crates/chat-client/src/network.rs

use anyhow::Result;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use chat_core::PushEvent;
use chat_protocol::{decode_push_event, ChatBody, SseDecoder};

use crate::types::BackoffConfig;

const SESSION_COOKIE: &str = "CHATSESSION";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("server closed the stream")]
    StreamClosed,
}

pub struct ChatConnection {
    http: Client,
    server_url: String,
    session: Option<String>,
    backoff: BackoffConfig,
    reconnect_attempts: u32,
}

impl ChatConnection {
    pub fn new(server_url: &str, session: Option<String>, backoff: BackoffConfig) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            session,
            backoff,
            reconnect_attempts: 0,
        }
    }

    /// Session id in use, once known.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Open the push stream, adopting the session the server issues.
    pub async fn connect(&mut self) -> Result<Response> {
        let url = format!("{}/chats/connect", self.server_url);
        info!("Connecting to {}...", url);

        let mut request = self.http.get(&url);
        if let Some(session) = &self.session {
            request = request.header(COOKIE, format!("{SESSION_COOKIE}={session}"));
        }
        let response = check(request.send().await?).await?;

        if let Some(issued) = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(session_from_set_cookie)
        {
            debug!(session = %issued, "server issued session");
            self.session = Some(issued);
        }
        Ok(response)
    }

    /// Stream events to `on_event` forever, reconnecting with backoff.
    ///
    /// Only returns when the server rejects the request outright.
    pub async fn listen<F>(&mut self, mut on_event: F) -> Result<()>
    where
        F: FnMut(&PushEvent),
    {
        loop {
            match self.connect().await {
                Ok(response) => {
                    let outcome = self.read_stream(response, &mut on_event).await;
                    if let Err(e) = outcome {
                        warn!("Stream interrupted: {}", e);
                    }
                }
                Err(e) if is_fatal(&e) => {
                    error!("Connection refused by server: {}", e);
                    return Err(e);
                }
                Err(e) => error!("Connection failed: {}", e),
            }
            self.handle_disconnect().await;
        }
    }

    async fn read_stream<F>(&mut self, mut response: Response, on_event: &mut F) -> Result<()>
    where
        F: FnMut(&PushEvent),
    {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = response.chunk().await? {
            decoder.push(&chunk);
            while let Some(frame) = decoder.next_frame()? {
                match decode_push_event(&frame) {
                    Ok(event) => {
                        if matches!(event, PushEvent::Connect) {
                            self.reconnect_attempts = 0;
                        }
                        on_event(&event);
                    }
                    Err(e) => warn!("Skipping frame {:?}: {}", frame.name, e),
                }
            }
        }
        Err(ClientError::StreamClosed.into())
    }

    async fn handle_disconnect(&mut self) {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        let delay = self.backoff.delay(self.reconnect_attempts);
        warn!(
            "Connection lost, reconnecting in {:?} (attempt {})",
            delay, self.reconnect_attempts
        );
        tokio::time::sleep(delay).await;
    }

    pub async fn send(&self, text: &str) -> Result<ChatBody> {
        let response = self
            .http
            .post(format!("{}/chats", self.server_url))
            .json(&json!({ "message": text }))
            .send()
            .await?;
        let body = check(response).await?.json::<ChatBody>().await?;
        debug!("Sent message: {:?}", body);
        Ok(body)
    }

    pub async fn history(&self) -> Result<Vec<ChatBody>> {
        let response = self
            .http
            .get(format!("{}/chats", self.server_url))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body }.into())
}

/// 4xx answers will not change on retry.
fn is_fatal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::Status { status, .. }) if status.is_client_error()
    )
}

fn session_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.trim().split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_session_from_set_cookie() {
        assert_eq!(
            session_from_set_cookie("CHATSESSION=abc; Path=/; HttpOnly; SameSite=Lax"),
            Some("abc".to_string())
        );
        assert_eq!(session_from_set_cookie("other=1; Path=/"), None);
        assert_eq!(session_from_set_cookie("CHATSESSION=; Path=/"), None);
    }

    #[test]
    fn only_client_errors_are_fatal() {
        let bad_request = anyhow::Error::from(ClientError::Status {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        });
        let busy = anyhow::Error::from(ClientError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        });
        assert!(is_fatal(&bad_request));
        assert!(!is_fatal(&busy));
        assert!(!is_fatal(&ClientError::StreamClosed.into()));
    }

    #[test]
    fn trims_trailing_slash_from_server_url() {
        let conn = ChatConnection::new("http://localhost:8080/", None, BackoffConfig::default());
        assert_eq!(conn.server_url, "http://localhost:8080");
        assert_eq!(conn.session(), None);
    }
}
