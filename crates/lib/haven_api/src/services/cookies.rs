//! Cookie service — set/get/clear auth cookies.
//!
//! The transport token travels in an httpOnly `accessToken` cookie; the
//! CSRF double-submit token in a script-readable `XSRF-TOKEN` cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use haven_core::auth::jwt::TRANSPORT_TOKEN_EXPIRY_SECS;

/// Cookie name for the transport token.
pub const ACCESS_COOKIE: &str = "accessToken";
/// Cookie name for the CSRF double-submit token.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";
/// Header the client must echo the CSRF token in.
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Build the httpOnly cookie carrying the transport token (~24h).
pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(TRANSPORT_TOKEN_EXPIRY_SECS))
        .build()
}

/// Build an expired cookie to clear the transport token.
pub fn clear_access_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Build the CSRF cookie. Not httpOnly: the frontend reads it and echoes
/// the value in [`XSRF_HEADER`].
pub fn xsrf_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((XSRF_COOKIE.to_string(), token.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(TRANSPORT_TOKEN_EXPIRY_SECS))
        .build()
}
