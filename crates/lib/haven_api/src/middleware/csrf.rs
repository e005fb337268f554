//! CSRF double-submit protection.
//!
//! Applies to state-changing methods authenticated via the session cookie:
//! the value of the `XSRF-TOKEN` cookie must be echoed in the
//! `X-XSRF-TOKEN` header. Bearer-authenticated requests carry no ambient
//! credential and are exempt.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::AppError;
use crate::services::cookies::{ACCESS_COOKIE, XSRF_COOKIE, XSRF_HEADER};

const CSRF_TOKEN_LENGTH: usize = 32;

/// Generate a fresh double-submit token.
pub fn issue_csrf_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Axum middleware enforcing the double-submit check.
pub async fn verify_csrf(
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_safe_method(request.method()) || jar.get(ACCESS_COOKIE).is_none() {
        return Ok(next.run(request).await);
    }

    let cookie_token = jar
        .get(XSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| AppError::Forbidden("Invalid or missing CSRF token".into()))?;

    let header_token = request
        .headers()
        .get(XSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    if header_token != Some(cookie_token.as_str()) {
        return Err(AppError::Forbidden("Invalid or missing CSRF token".into()));
    }

    Ok(next.run(request).await)
}
