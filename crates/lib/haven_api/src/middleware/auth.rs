//! Authentication middleware — transport-token extraction and session
//! resolution.
//!
//! Per-request state machine: no token → 401; bad signature or revoked/
//! missing session → 401 + cookie cleared; disabled owner → 403 + cookie
//! cleared; otherwise the resolved `{user, session}` is attached to the
//! request and nothing is mutated.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use haven_core::auth::tokens::Resolution;
use haven_core::models::auth::{SessionTokenRecord, User};

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::{ACCESS_COOKIE, clear_access_cookie};

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// The authenticated request context, stored in request extensions and
/// consumed by every downstream handler and gate.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session: SessionTokenRecord,
}

/// Pull the transport token from the `accessToken` cookie, else from
/// `Authorization: Bearer`. The cookie wins when both are present
/// (same-origin browser flows).
fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Reject with `error`, clearing the transport cookie so a known-bad token
/// is not retried.
fn reject_and_clear(error: AppError, secure: bool) -> Response {
    let jar = CookieJar::new().add(clear_access_cookie(secure));
    (jar, error).into_response()
}

/// Axum middleware guarding protected routes.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&jar, &request) else {
        return AppError::Unauthorized(UNAUTHORIZED_MESSAGE.into()).into_response();
    };

    match state.tokens.resolve(&token).await {
        Ok(Resolution::Valid { user, session }) => {
            request.extensions_mut().insert(AuthContext { user, session });
            next.run(request).await
        }
        Ok(Resolution::UserDisabled) => reject_and_clear(
            AppError::Forbidden("Your account is disabled. Please contact an administrator.".into()),
            state.config.production,
        ),
        Ok(Resolution::Invalid) => reject_and_clear(
            AppError::Unauthorized(UNAUTHORIZED_MESSAGE.into()),
            state.config.production,
        ),
        Err(err) => AppError::from(err).into_response(),
    }
}
