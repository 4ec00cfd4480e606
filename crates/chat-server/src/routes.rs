//! HTTP route handlers.
//!
//! - `GET  /chats/connect` : open a push stream for the caller
//! - `POST /chats`         : submit a message
//! - `GET  /chats`         : list stored messages, newest first
//! - `GET  /health`        : liveness and connection count

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use chat_core::ChannelSink;
use chat_protocol::{ChatBody, ChatRequest, EVENT_STREAM_CONTENT_TYPE};

use crate::error::ApiError;
use crate::session;
use crate::stream::EventStream;
use crate::types::AppState;

pub async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = session::resolve(&headers)?;
    let client_id = session.client_id;

    let (sink, rx) = ChannelSink::new(state.config.channel_capacity);
    let handle = {
        let _admit = state.admission.lock().await;

        // A reconnect replaces its own slot, so it never counts against the cap.
        let reconnecting = state.registry.get(&client_id).is_some();
        if !reconnecting && state.registry.len() >= state.config.max_clients {
            warn!(
                client = %client_id,
                max_clients = state.config.max_clients,
                "rejecting connection: max_clients reached"
            );
            return Err(ApiError::Unavailable("too many connections"));
        }

        // The handshake goes into a fresh channel, so this never waits.
        state.registry.open_connection(client_id.clone(), sink).await?
    };
    info!(
        client = %client_id,
        handle = %handle.id(),
        connections = state.registry.len(),
        "client connected"
    );

    let mut response = Body::from_stream(EventStream::new(rx, handle)).into_response();
    let out = response.headers_mut();
    out.insert(CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE));
    out.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    out.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    if session.minted {
        let cookie = HeaderValue::from_str(&session::set_cookie_value(&client_id))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        out.insert(SET_COOKIE, cookie);
    }

    Ok(response)
}

pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatBody>, ApiError> {
    let message = state.service.submit_message(&request.message).await?;
    debug!(message_id = message.id, "accepted message");
    Ok(Json(ChatBody::from(&message)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ChatBody>>, ApiError> {
    let messages = state.service.list_messages().await?;
    Ok(Json(messages.iter().map(ChatBody::from).collect()))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.registry.len(),
    }))
}
