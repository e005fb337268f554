//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API-facing response
//! shapes (which carry `#[serde(rename)]` for camelCase etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain user with its resolved role name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
    pub disabled: bool,
    pub role: String,
}

/// User plus password hash (for credential checks only, never cached).
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Server-side session token record. One row per login.
///
/// Rows are never deleted; logout flips `disabled` so the table doubles
/// as an audit trail of logins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Purpose of a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    VerifyEmail,
    ResetPassword,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::VerifyEmail => "verify_email",
            CodePurpose::ResetPassword => "reset_password",
        }
    }
}

/// One-time verification / password-reset code record.
///
/// The raw code is never persisted; `code_hash` is a bcrypt hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeCodeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: CodePurpose,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Claims embedded in the signed transport token.
///
/// `sub` references a session-token row, not the user directly: the token
/// must always be re-validated against the live record so that revocation
/// cannot be bypassed by a still-signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportClaims {
    /// Subject — session token ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// User display name snapshot.
    pub name: String,
    /// User email snapshot.
    pub email: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}
