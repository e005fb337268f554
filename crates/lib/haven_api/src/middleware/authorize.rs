//! Authorization gates: role membership and resource ownership.
//!
//! Both gates run after [`super::auth::authenticate`] and fail closed.
//! An absent auth context is answered with 401.

use axum::{
    extract::{RawPathParams, Request, State},
    http::Extensions,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
const FORBIDDEN_MESSAGE: &str = "Access denied";

/// Role with full override on ownership checks.
const ADMIN_ROLE: &str = "Admin";

/// Entities the ownership gate knows how to resolve.
#[derive(Debug, Clone, Copy)]
pub enum OwnedEntity {
    /// The path id must be the requester's own user id.
    User,
    /// The organization must exist and be verified.
    Organization,
    /// The requester must hold an admin/owner membership of a verified
    /// organization.
    OrganizationMember,
}

fn auth_context(extensions: &Extensions) -> Result<&AuthContext, AppError> {
    extensions
        .get::<AuthContext>()
        .ok_or_else(|| AppError::Unauthorized(UNAUTHORIZED_MESSAGE.into()))
}

/// Role gate: pass when the authenticated user's role is in `allowed`
/// (case-insensitive). No role match means no access — there is no
/// wildcard.
pub fn role_gate<'a>(
    extensions: &'a Extensions,
    allowed: &[&str],
) -> Result<&'a AuthContext, AppError> {
    let ctx = auth_context(extensions)?;
    if allowed
        .iter()
        .any(|role| role.eq_ignore_ascii_case(&ctx.user.role))
    {
        Ok(ctx)
    } else {
        Err(AppError::Forbidden(FORBIDDEN_MESSAGE.into()))
    }
}

/// Ownership gate: administrators pass outright; everyone else must own the
/// resource or hold a sufficient membership grant.
///
/// A missing path parameter is a routing misconfiguration, answered with
/// 500 rather than any client-error status.
pub async fn ownership_gate(
    state: &AppState,
    extensions: &Extensions,
    entity: OwnedEntity,
    raw_id: Option<&str>,
) -> Result<(), AppError> {
    let ctx = auth_context(extensions)?;

    if ctx.user.role.eq_ignore_ascii_case(ADMIN_ROLE) {
        return Ok(());
    }

    let raw_id = raw_id.ok_or_else(|| {
        AppError::Internal("ownership gate is missing its path parameter".into())
    })?;
    let id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::validation("Invalid resource id"))?;

    match entity {
        OwnedEntity::User => {
            if ctx.user.id == id {
                Ok(())
            } else {
                Err(AppError::Forbidden(FORBIDDEN_MESSAGE.into()))
            }
        }
        OwnedEntity::Organization => {
            if state.orgs.find_verified(id).await?.is_some() {
                Ok(())
            } else {
                Err(AppError::Forbidden(FORBIDDEN_MESSAGE.into()))
            }
        }
        OwnedEntity::OrganizationMember => {
            let membership = state
                .orgs
                .find_membership(id, ctx.user.id)
                .await?
                .filter(|member| member.role.can_administer())
                .ok_or_else(|| AppError::Forbidden(FORBIDDEN_MESSAGE.into()))?;
            if state
                .orgs
                .find_verified(membership.organization_id)
                .await?
                .is_none()
            {
                return Err(AppError::Forbidden(
                    "Organization verification is pending".into(),
                ));
            }
            Ok(())
        }
    }
}

fn path_param<'a>(params: &'a RawPathParams, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Middleware: only administrators pass.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    role_gate(request.extensions(), &[ADMIN_ROLE])?;
    Ok(next.run(request).await)
}

/// Middleware: the `{id}` path parameter must be the requester's own user
/// id (admin override applies).
pub async fn own_user(
    State(state): State<AppState>,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    ownership_gate(
        &state,
        request.extensions(),
        OwnedEntity::User,
        path_param(&params, "id"),
    )
    .await?;
    Ok(next.run(request).await)
}

/// Middleware: the `{id}` organization must exist and be verified.
pub async fn verified_org(
    State(state): State<AppState>,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    ownership_gate(
        &state,
        request.extensions(),
        OwnedEntity::Organization,
        path_param(&params, "id"),
    )
    .await?;
    Ok(next.run(request).await)
}

/// Middleware: the requester must administer the `{id}` organization.
pub async fn org_admin(
    State(state): State<AppState>,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    ownership_gate(
        &state,
        request.extensions(),
        OwnedEntity::OrganizationMember,
        path_param(&params, "id"),
    )
    .await?;
    Ok(next.run(request).await)
}
