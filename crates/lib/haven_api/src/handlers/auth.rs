//! Authentication request handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ClientAddr;
use crate::middleware::auth::AuthContext;
use crate::middleware::csrf::issue_csrf_token;
use crate::models::{
    ApiResponse, AuthData, CodeData, CsrfData, ForgotPasswordRequest, LoginRequest,
    RegisterRequest, ResetLookupData, ResetPasswordRequest, SessionView, VerifyRequest,
};
use crate::services::auth;
use crate::services::cookies::{access_cookie, clear_access_cookie, xsrf_cookie};

/// `GET /auth/csrf` — issue the double-submit token.
pub async fn csrf_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<CsrfData>>) {
    let token = issue_csrf_token();
    let jar = jar.add(xsrf_cookie(&token, state.config.production));
    (
        jar,
        Json(ApiResponse::message_with_data(
            "CSRF token issued",
            CsrfData { token },
        )),
    )
}

/// `POST /auth/register` — create an account; sets the transport cookie and
/// triggers a verification-code send.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<ApiResponse<AuthData>>)> {
    let (user, issued) = auth::register(
        &state,
        &body.name,
        &body.email,
        &body.password,
        &body.confirm_password,
    )
    .await?;
    let jar = jar.add(access_cookie(&issued.transport_token, state.config.production));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::message_with_data(
            "User created",
            AuthData {
                user: (&user).into(),
                token: issued.transport_token,
            },
        )),
    ))
}

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientAddr(addr): ClientAddr,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthData>>)> {
    let (user, issued) = auth::login(&state, &addr, &body.email, &body.password).await?;
    let jar = jar.add(access_cookie(&issued.transport_token, state.config.production));
    Ok((
        jar,
        Json(ApiResponse::message_with_data(
            "User logged in",
            AuthData {
                user: (&user).into(),
                token: issued.transport_token,
            },
        )),
    ))
}

/// `POST /auth/verify/{token_id}` — redeem a verification code.
pub async fn verify_handler(
    State(state): State<AppState>,
    Path(token_id): Path<Uuid>,
    Json(body): Json<VerifyRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    auth::verify_email(&state, token_id, &body.code).await?;
    Ok(Json(ApiResponse::message("Email verified")))
}

/// `PUT /auth/verify/regenerate` — invalidate prior codes, issue a new one.
pub async fn regenerate_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> AppResult<Json<ApiResponse<CodeData>>> {
    let record = auth::regenerate_verification(&state, &ctx.user).await?;
    Ok(Json(ApiResponse::message_with_data(
        "Verification code sent",
        (&record).into(),
    )))
}

/// `POST /auth/forgot-password` — start the reset flow. Always answers with
/// the same generic success, whether or not the email exists.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    auth::forgot_password(&state, &body.email).await?;
    Ok(Json(ApiResponse::message(
        "Password reset request has been processed successfully",
    )))
}

/// `GET /auth/forgot-password/{id}` — resolve an active reset record to the
/// account email for the reset page.
pub async fn reset_lookup_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ResetLookupData>>> {
    let email = auth::reset_lookup(&state, id).await?;
    Ok(Json(ApiResponse::data(ResetLookupData { email })))
}

/// `POST /auth/forgot-password/{id}` — redeem a reset code.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    auth::reset_password(&state, id, &body.code, &body.password, &body.confirm_password).await?;
    Ok(Json(ApiResponse::message(
        "Password reset successful. Please login to your account.",
    )))
}

/// `POST /auth/logout` — revoke the current session.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<()>>)> {
    state.tokens.revoke(ctx.session.id, &ctx.user).await?;
    let jar = jar.add(clear_access_cookie(state.config.production));
    Ok((jar, Json(ApiResponse::message("User logged out"))))
}

/// `POST /auth/logout/{id}` — revoke one of the requester's sessions.
pub async fn logout_device_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<()>>)> {
    state.tokens.revoke(id, &ctx.user).await?;
    let jar = jar.add(clear_access_cookie(state.config.production));
    Ok((jar, Json(ApiResponse::message("User logged out from device"))))
}

/// `POST /auth/logout/all` — revoke every session of the requester.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<()>>)> {
    state.tokens.revoke_all(&ctx.user).await?;
    let jar = jar.add(clear_access_cookie(state.config.production));
    Ok((
        jar,
        Json(ApiResponse::message("User logged out from all devices")),
    ))
}

/// `GET /auth/sessions` — the requester's active sessions, newest first.
pub async fn sessions_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> AppResult<Json<ApiResponse<Vec<SessionView>>>> {
    let sessions = state.tokens.active_sessions(&ctx.user).await?;
    Ok(Json(ApiResponse::data(
        sessions.iter().map(SessionView::from).collect(),
    )))
}
