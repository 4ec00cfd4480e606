//! Client identity from the session cookie.
//!
//! A browser keeps its `CHATSESSION` cookie across page refreshes, so a
//! reconnect lands on the same [`ClientId`] and supersedes the previous
//! stream. Requests without the cookie get a freshly minted id.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use uuid::Uuid;

use chat_core::{ChatError, ClientId};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "CHATSESSION";

/// Identity of the caller, and whether it was minted for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub client_id: ClientId,
    pub minted: bool,
}

/// Resolve the caller's identity.
///
/// A present but empty cookie is rejected with
/// [`ChatError::InvalidIdentity`].
pub fn resolve(headers: &HeaderMap) -> Result<Session, ChatError> {
    match cookie_value(headers, SESSION_COOKIE) {
        Some(raw) => Ok(Session {
            client_id: ClientId::new(raw)?,
            minted: false,
        }),
        None => Ok(Session {
            client_id: ClientId::new(Uuid::new_v4().simple().to_string())?,
            minted: true,
        }),
    }
}

/// `Set-Cookie` value binding the browser to `client_id`.
pub fn set_cookie_value(client_id: &ClientId) -> String {
    format!("{SESSION_COOKIE}={client_id}; Path=/; HttpOnly; SameSite=Lax")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn reads_session_cookie_among_others() {
        let session = resolve(&headers("theme=dark; CHATSESSION=abc123; lang=ko")).unwrap();
        assert_eq!(session.client_id.as_str(), "abc123");
        assert!(!session.minted);
    }

    #[test]
    fn mints_identity_without_cookie() {
        let a = resolve(&HeaderMap::new()).unwrap();
        let b = resolve(&HeaderMap::new()).unwrap();
        assert!(a.minted);
        assert_ne!(a.client_id, b.client_id);
    }

    #[test]
    fn empty_cookie_is_invalid_identity() {
        assert_eq!(
            resolve(&headers("CHATSESSION=")),
            Err(ChatError::InvalidIdentity)
        );
    }

    #[test]
    fn set_cookie_round_trips_through_resolve() {
        let id = ClientId::new("s1").unwrap();
        let cookie = set_cookie_value(&id);
        let pair = cookie.split(';').next().unwrap();
        assert_eq!(resolve(&headers(pair)).unwrap().client_id, id);
    }
}
