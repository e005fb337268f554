//! Transport-token signing and verification.
//!
//! The transport token is the stateless, signed wrapper handed to clients.
//! It references a session-token row by id; signature validity alone never
//! authenticates a request — resolution always re-checks the live record.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{TransportClaims, User};

/// Transport token lifetime: 24 hours.
pub const TRANSPORT_TOKEN_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Sign a transport token (HS256) for `session_id` with a snapshot of the
/// owning user.
pub fn sign_transport_token(
    session_id: Uuid,
    user: &User,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TransportClaims {
        sub: session_id,
        name: user.name.clone(),
        email: user.email.clone(),
        exp: (now + Duration::seconds(TRANSPORT_TOKEN_EXPIRY_SECS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a transport token, returning the claims on success.
///
/// Every decode failure (bad signature, malformed token, expired) collapses
/// to `None`; verification internals must never leak into responses.
pub fn verify_transport_token(token: &str, secret: &[u8]) -> Option<TransportClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TransportClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve the signing secret: env var `SIGNING_SECRET` → `JWT_SECRET` →
/// persisted file (generated once).
pub fn resolve_signing_secret() -> String {
    if let Ok(secret) = std::env::var("SIGNING_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = signing_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new signing secret");
    secret
}

/// Path to the persisted signing secret file.
fn signing_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haven")
        .join("signing-secret")
}
