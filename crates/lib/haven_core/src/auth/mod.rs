//! Authentication and session-lifecycle logic.
//!
//! Provides password hashing, one-time code generation, transport-token
//! signing, the revocable token store, and the login throttle shared by
//! `haven_api` and `haven_server`.

pub mod code;
pub mod jwt;
pub mod password;
pub mod throttle;
pub mod tokens;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Store error: {0}")]
    StoreError(#[from] crate::store::StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
