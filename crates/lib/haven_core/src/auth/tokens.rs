//! Revocable token store.
//!
//! A login creates one server-side session row; the client only ever holds
//! the signed transport wrapper. Resolution re-checks the live row on every
//! request, so revocation wins over any still-valid signature.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::AuthError;
use super::jwt::{TRANSPORT_TOKEN_EXPIRY_SECS, sign_transport_token, verify_transport_token};
use crate::events::{EventBus, SessionEvent};
use crate::models::auth::{SessionTokenRecord, User};
use crate::store::{SessionStore, UserStore};
use crate::ids::uuidv7;

/// A freshly issued session with its transport wrapper.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub transport_token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of resolving a transport token.
///
/// `UserDisabled` is distinguished from `Invalid` so the HTTP layer can
/// answer 403 instead of 401.
#[derive(Debug)]
pub enum Resolution {
    Valid {
        user: User,
        session: SessionTokenRecord,
    },
    UserDisabled,
    Invalid,
}

/// Issues, revokes, and resolves session tokens.
pub struct TokenService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
    secret: Vec<u8>,
}

impl TokenService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        events: Arc<EventBus>,
        secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            users,
            sessions,
            events,
            secret: secret.into(),
        }
    }

    /// Create a session for `user` and return its transport token.
    pub async fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let session = self.sessions.insert(uuidv7(), user.id).await?;
        let transport_token = sign_transport_token(session.id, user, &self.secret)?;
        Ok(IssuedToken {
            transport_token,
            session_id: session.id,
            expires_at: Utc::now() + Duration::seconds(TRANSPORT_TOKEN_EXPIRY_SECS),
        })
    }

    /// Resolve a transport token to a live user + session.
    ///
    /// Checks run cheapest-first: signature/expiry, then the session row,
    /// then the owning user. All three are mandatory.
    pub async fn resolve(&self, transport_token: &str) -> Result<Resolution, AuthError> {
        let Some(claims) = verify_transport_token(transport_token, &self.secret) else {
            return Ok(Resolution::Invalid);
        };
        let Some(session) = self.sessions.find_enabled(claims.sub).await? else {
            return Ok(Resolution::Invalid);
        };
        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            return Ok(Resolution::Invalid);
        };
        if user.disabled {
            return Ok(Resolution::UserDisabled);
        }
        Ok(Resolution::Valid { user, session })
    }

    /// Revoke one session, scoped to the requesting user. A session that is
    /// already disabled or owned by someone else is a silent no-op.
    pub async fn revoke(&self, session_id: Uuid, user: &User) -> Result<(), AuthError> {
        if self.sessions.disable(session_id, user.id).await? {
            self.events.publish(
                &user.id.to_string(),
                SessionEvent::Revoked {
                    user_id: user.id,
                    session_id: Some(session_id),
                },
            );
        }
        Ok(())
    }

    /// Revoke every enabled session of `user` in one bulk update.
    pub async fn revoke_all(&self, user: &User) -> Result<u64, AuthError> {
        let revoked = self.sessions.disable_all(user.id).await?;
        if revoked > 0 {
            self.events.publish(
                &user.id.to_string(),
                SessionEvent::Revoked {
                    user_id: user.id,
                    session_id: None,
                },
            );
        }
        Ok(revoked)
    }

    /// Enabled sessions owned by `user`, newest first.
    pub async fn active_sessions(&self, user: &User) -> Result<Vec<SessionTokenRecord>, AuthError> {
        Ok(self.sessions.list_enabled(user.id).await?)
    }
}
