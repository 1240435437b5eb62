//! Task board.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use ca_portal_core::TaskId;

use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::Task;
use crate::services::{TaskInput, TaskService, TaskUpdate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub zone: Option<String>,
    #[serde(default)]
    pub points: i32,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub zone: Option<String>,
    pub points: Option<i32>,
    pub active: Option<bool>,
}

async fn list_tasks(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(TaskService::new(state.program()).list_for(&user).await?))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn create_task(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let input = TaskInput {
        title: body.title,
        description: body.description,
        zone: body.zone,
        points: body.points,
        active: body.active,
    };
    let task = TaskService::new(state.program()).create(input, &admin).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn update_task(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let update = TaskUpdate {
        title: body.title,
        description: body.description,
        zone: body.zone,
        points: body.points,
        active: body.active,
    };
    Ok(Json(TaskService::new(state.program()).update(id, update).await?))
}

#[instrument(skip(state), fields(admin_id = %admin.id))]
async fn delete_task(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, AppError> {
    TaskService::new(state.program()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
