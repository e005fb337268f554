//! API request/response shapes (camelCase on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use haven_core::models::auth::{OneTimeCodeRecord, SessionTokenRecord, User};
use haven_core::models::org::{Organization, OrganizationMember};

/// Uniform success envelope. Failures render through
/// [`crate::error::AppError`] with the same `success`/`message` shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn message_with_data(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
    pub role: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_verified: user.is_verified,
            role: user.role.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&SessionTokenRecord> for SessionView {
    fn from(session: &SessionTokenRecord) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationView {
    pub id: Uuid,
    pub name: String,
    pub verification_status: String,
}

impl From<&Organization> for OrganizationView {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            verification_status: org.verification_status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

impl From<&OrganizationMember> for MemberView {
    fn from(member: &OrganizationMember) -> Self {
        Self {
            organization_id: member.organization_id,
            user_id: member.user_id,
            role: member.role.as_str().to_string(),
        }
    }
}

/// Login/register payload: the user plus the transport token (also set as
/// a cookie).
#[derive(Debug, Serialize)]
pub struct AuthData {
    pub user: UserView,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CsrfData {
    pub token: String,
}

/// Issued-code payload: the record id the client needs for the verify URL.
/// The code itself only ever travels by mail.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeData {
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<&OneTimeCodeRecord> for CodeData {
    fn from(record: &OneTimeCodeRecord) -> Self {
        Self {
            token_id: record.id,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResetLookupData {
    pub email: String,
}
