//! Server-side session helpers.
//!
//! Browser clients authenticate through the session cookie managed by
//! `tower-sessions`; the session holds the same access token that API clients
//! send as a bearer header.

use tower_sessions::Session;

use crate::error::ApiError;

/// Key for storing the access token in the session.
pub const SESSION_TOKEN_KEY: &str = "token";

/// Remember the access token for cookie-authenticated requests.
pub async fn store_token(session: &Session, token: &str) -> Result<(), ApiError> {
    session
        .insert(SESSION_TOKEN_KEY, token.to_string())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    session
        .save()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// The token kept in the session, if any.
pub async fn session_token(session: &Session) -> Result<Option<String>, ApiError> {
    session
        .get::<String>(SESSION_TOKEN_KEY)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Drop everything stored for this session and expire the cookie.
pub async fn clear(session: &Session) -> Result<(), ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[tokio::test]
    async fn test_token_round_trip() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        assert_eq!(session_token(&session).await.unwrap(), None);

        store_token(&session, "abc.def.ghi").await.unwrap();
        assert_eq!(
            session_token(&session).await.unwrap().as_deref(),
            Some("abc.def.ghi")
        );

        clear(&session).await.unwrap();
        assert_eq!(session_token(&session).await.unwrap(), None);
    }
}
