//! Organization request handlers. The ownership middleware has already
//! resolved verification status and membership by the time these run.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ApiResponse, MemberView, OrganizationView};

/// `GET /organizations/{id}` — fetch a verified organization.
pub async fn get_org_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrganizationView>>> {
    let org = state
        .orgs
        .find_verified(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".into()))?;
    Ok(Json(ApiResponse::data((&org).into())))
}

/// `GET /organizations/{id}/members` — list an organization's members.
/// Requires an admin/owner membership (or the Admin role).
pub async fn org_members_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<MemberView>>>> {
    let members = state.orgs.list_members(id).await?;
    Ok(Json(ApiResponse::data(
        members.iter().map(MemberView::from).collect(),
    )))
}
