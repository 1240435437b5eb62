//! Current user and admin user management.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

use ca_portal_core::{Role, UserId};

use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::Ambassador;
use crate::services::reports::{self, Profile};
use crate::services::{RoleService, UserUpdate, update_user};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(me))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/promote", post(promote))
        .route("/api/admin/users/{id}", patch(edit_user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditUserRequest {
    pub role: Option<Role>,
    pub zone: Option<String>,
    pub points: Option<i32>,
    pub tasks_done: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub user_id: UserId,
    pub role: Role,
    pub zone: Option<String>,
}

async fn me(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(reports::profile(state.directory(), user).await?))
}

async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Ambassador>>, AppError> {
    Ok(Json(state.directory().list_ambassadors().await?))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn edit_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<EditUserRequest>,
) -> Result<Json<Ambassador>, AppError> {
    let update = UserUpdate {
        role: body.role,
        zone: body.zone,
        points: body.points,
        tasks_done: body.tasks_done,
    };
    Ok(Json(update_user(state.directory(), id, update).await?))
}

/// Give a user a role. A duplicate head for the zone is a 400 naming the zone.
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn promote(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<PromoteRequest>,
) -> Result<Json<Ambassador>, AppError> {
    let user = RoleService::new(state.directory())
        .set_role(body.user_id, body.role, body.zone.as_deref())
        .await?;
    Ok(Json(user))
}
