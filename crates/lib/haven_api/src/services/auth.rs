//! Authentication service — register/login/verify/reset flows over the
//! core token store and repositories.

use tracing::{info, warn};
use uuid::Uuid;

use haven_core::auth::code::{generate_code, verify_code};
use haven_core::auth::password::{hash_password, scrambled_password_hash, verify_password};
use haven_core::auth::tokens::IssuedToken;
use haven_core::models::auth::{CodePurpose, OneTimeCodeRecord, User};
use haven_core::store::NewUser;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::mail::OutgoingMail;
use crate::validation;

/// Length of emailed verification codes.
pub const VERIFY_CODE_LENGTH: usize = 6;

/// Length of password-reset codes. Longer than verification codes: the
/// reset code is the only thing between an attacker and a password change.
pub const RESET_CODE_LENGTH: usize = 12;

/// Role granted at registration.
const DEFAULT_ROLE: &str = "User";

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_VERIFY_CODE: &str = "Invalid or expired verification code";
const INVALID_RESET_CODE: &str = "Password reset code is invalid or expired";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Registration & verification codes
// ---------------------------------------------------------------------------

/// Create an account, issue a verification code, and open a session.
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> AppResult<(User, IssuedToken)> {
    validation::validate_registration(name, email, password, confirm)?;

    let email = normalize_email(email);
    let password_hash = hash_password(password)?;

    let user = state
        .users
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
        })
        .await?;

    issue_verification_code(state, &user).await?;

    let issued = state.tokens.issue(&user).await?;
    info!(user_id = %user.id, "user registered");
    Ok((user, issued))
}

/// Issue a fresh verification code for `user`, disabling any prior codes.
///
/// The mail handoff is best-effort; a delivery failure never fails the
/// request (the code can be regenerated).
pub async fn issue_verification_code(
    state: &AppState,
    user: &User,
) -> AppResult<OneTimeCodeRecord> {
    if user.is_verified {
        return Err(AppError::validation("User is already verified"));
    }

    let generated = generate_code(VERIFY_CODE_LENGTH, state.config.verify_code_ttl_minutes)?;
    let record = state
        .codes
        .issue(
            user.id,
            CodePurpose::VerifyEmail,
            &generated.code_hash,
            generated.expires_at,
        )
        .await?;

    let url = format!("{}/verify-email/{}", state.config.frontend_url, record.id);
    let mail = OutgoingMail {
        to: user.email.clone(),
        subject: format!("{} : Haven email verification", generated.code),
        body: format!(
            "Please verify your email by visiting:\n{url}\nVerification code: {}",
            generated.code
        ),
    };
    if let Err(err) = state.mailer.send(mail).await {
        warn!(user_id = %user.id, %err, "verification mail handoff failed");
    }
    Ok(record)
}

/// Redeem a verification code. Single-use: success disables every
/// outstanding verification code for the user.
pub async fn verify_email(state: &AppState, code_id: Uuid, submitted: &str) -> AppResult<()> {
    let Some(record) = state
        .codes
        .find_active(code_id, CodePurpose::VerifyEmail)
        .await?
    else {
        return Err(AppError::NotFound(INVALID_VERIFY_CODE.into()));
    };

    if !verify_code(submitted, &record.code_hash)? {
        return Err(AppError::NotFound(INVALID_VERIFY_CODE.into()));
    }

    state
        .codes
        .disable_all(record.user_id, CodePurpose::VerifyEmail)
        .await?;
    state.users.mark_verified(record.user_id).await?;
    info!(user_id = %record.user_id, "email verified");
    Ok(())
}

/// Invalidate prior verification codes and issue a new one.
pub async fn regenerate_verification(
    state: &AppState,
    user: &User,
) -> AppResult<OneTimeCodeRecord> {
    // `CodeStore::issue` disables priors in the same transaction.
    issue_verification_code(state, user).await
}

// ---------------------------------------------------------------------------
// Login & lockout
// ---------------------------------------------------------------------------

/// Authenticate with email + password.
///
/// Failed attempts count against the `(addr, email)` throttle key. Crossing
/// the threshold disables the account and scrambles its password; only the
/// reset flow recovers it.
pub async fn login(
    state: &AppState,
    addr: &str,
    email: &str,
    password: &str,
) -> AppResult<(User, IssuedToken)> {
    validation::validate_login(email, password)?;
    let email = normalize_email(email);

    if state.throttle.is_blocked(addr, &email) {
        lock_out(state, &email).await?;
        return Err(AppError::RateLimited(
            "Too many login attempts, your account has been temporarily disabled.".into(),
        ));
    }

    let Some(credentials) = state.users.find_credentials(&email).await? else {
        state.throttle.record_failure(addr, &email);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if credentials.user.disabled {
        return Err(AppError::Unauthorized(
            "Your account is disabled. Please reset your password to continue.".into(),
        ));
    }

    if !verify_password(password, &credentials.password_hash)? {
        state.throttle.record_failure(addr, &email);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    state.throttle.clear(addr, &email);
    let issued = state.tokens.issue(&credentials.user).await?;
    info!(user_id = %credentials.user.id, "user logged in");
    Ok((credentials.user, issued))
}

/// Lockout: disable the account and replace its password with an
/// unguessable value. Idempotent (scoped to enabled accounts).
async fn lock_out(state: &AppState, email: &str) -> AppResult<()> {
    let scrambled = scrambled_password_hash()?;
    state.users.lock_account(email, &scrambled).await?;
    warn!(email, "account locked after repeated failed logins");
    Ok(())
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

/// Start the reset flow. Anti-enumeration: the outcome is identical whether
/// or not the email exists.
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    let Some(credentials) = state.users.find_credentials(&email).await? else {
        return Ok(());
    };
    let user = credentials.user;

    // Locked/disabled accounts may reset: this is their recovery path.
    let generated = generate_code(RESET_CODE_LENGTH, state.config.reset_code_ttl_minutes)?;
    let record = state
        .codes
        .issue(
            user.id,
            CodePurpose::ResetPassword,
            &generated.code_hash,
            generated.expires_at,
        )
        .await?;

    let url = format!("{}/forgot-password/{}", state.config.frontend_url, record.id);
    let mail = OutgoingMail {
        to: user.email.clone(),
        subject: "Haven password reset".into(),
        body: format!(
            "Hello {},\nWe received a request to change the password for your account. \
             If you did not request this, ignore this email.\n{url}\nReset code: {}",
            user.name, generated.code
        ),
    };
    if let Err(err) = state.mailer.send(mail).await {
        warn!(user_id = %user.id, %err, "reset mail handoff failed");
    }
    Ok(())
}

/// Resolve an active reset record to the account email (shown on the reset
/// page).
pub async fn reset_lookup(state: &AppState, code_id: Uuid) -> AppResult<String> {
    let Some(record) = state
        .codes
        .find_active(code_id, CodePurpose::ResetPassword)
        .await?
    else {
        return Err(AppError::NotFound(INVALID_RESET_CODE.into()));
    };
    let user = state
        .users
        .find_by_id(record.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(INVALID_RESET_CODE.into()))?;
    Ok(user.email)
}

/// Redeem a reset code: set the new password, re-enable the account, and
/// revoke every open session.
pub async fn reset_password(
    state: &AppState,
    code_id: Uuid,
    code: &str,
    password: &str,
    confirm: &str,
) -> AppResult<()> {
    let Some(record) = state
        .codes
        .find_active(code_id, CodePurpose::ResetPassword)
        .await?
    else {
        return Err(AppError::NotFound(INVALID_RESET_CODE.into()));
    };

    validation::validate_password_reset(password, confirm)?;

    if !verify_code(code, &record.code_hash)? {
        return Err(AppError::NotFound(INVALID_RESET_CODE.into()));
    }

    let password_hash = hash_password(password)?;
    state
        .users
        .set_password(record.user_id, &password_hash, false)
        .await?;
    state
        .codes
        .disable_all(record.user_id, CodePurpose::ResetPassword)
        .await?;

    // A changed password invalidates every open session.
    if let Some(user) = state.users.find_by_id(record.user_id).await? {
        state.tokens.revoke_all(&user).await?;
    }
    info!(user_id = %record.user_id, "password reset");
    Ok(())
}
