//! Session data types and the session establisher.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::AuthResult;

/// Key for storing the authenticated user in session.
pub const SESSION_USER_KEY: &str = "user";

/// Session data stored under [`SESSION_USER_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
}

/// Record `user_id` as the session's user and persist it before returning.
///
/// The session id is replaced first, so an id the client held before logging in
/// never becomes an authenticated one.
pub async fn establish_session(session: &Session, user_id: &str) -> AuthResult<()> {
    session.cycle_id().await?;
    session
        .insert(
            SESSION_USER_KEY,
            SessionUser {
                id: user_id.to_string(),
            },
        )
        .await?;
    // Redirect targets must see the session, so don't wait for the layer to save it
    session.save().await?;
    Ok(())
}

/// Clear the session data and delete its record.
pub async fn destroy_session(session: &Session) -> AuthResult<()> {
    session.flush().await?;
    Ok(())
}

/// User currently recorded in the session, if any.
pub async fn current_user(session: &Session) -> AuthResult<Option<SessionUser>> {
    Ok(session.get::<SessionUser>(SESSION_USER_KEY).await?)
}
