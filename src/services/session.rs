//! Staff session management.
//!
//! Sessions are opaque random tokens stored with an expiry. The token is
//! handed to browsers as an `HttpOnly` cookie and to the CLI as a bearer
//! token; both resolve through [`validate_session`].

use std::fmt::Write;

use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::store::{StaffSession, Store, StoreError};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Create a session valid for `ttl`, returning it.
///
/// # Errors
///
/// Store failures only.
pub async fn create_session(store: &dyn Store, ttl: Duration, now: OffsetDateTime) -> Result<StaffSession, StoreError> {
    let session = StaffSession { token: generate_token(), created_at: now, expires_at: now + ttl };
    store.create_session(&session).await?;
    Ok(session)
}

/// Resolve a token to a live session. Expired sessions are deleted on sight.
///
/// # Errors
///
/// Store failures only.
pub async fn validate_session(
    store: &dyn Store,
    token: &str,
    now: OffsetDateTime,
) -> Result<Option<StaffSession>, StoreError> {
    if token.is_empty() {
        return Ok(None);
    }
    match store.session(token).await? {
        Some(session) if session.expires_at > now => Ok(Some(session)),
        Some(_) => {
            store.delete_session(token).await?;
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Delete a session by token.
///
/// # Errors
///
/// Store failures only.
pub async fn delete_session(store: &dyn Store, token: &str) -> Result<(), StoreError> {
    store.delete_session(token).await
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
