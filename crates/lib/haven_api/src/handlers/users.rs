//! User request handlers. Access is gated by the ownership/role middleware
//! on the router.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ApiResponse, UserView};

/// `GET /users/{id}` — fetch one user. Requires ownership (or Admin).
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(ApiResponse::data((&user).into())))
}

/// `GET /admin/users` — list every user. Requires the Admin role.
pub async fn list_users_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<UserView>>>> {
    let users = state.users.list().await?;
    Ok(Json(ApiResponse::data(
        users.iter().map(UserView::from).collect(),
    )))
}
