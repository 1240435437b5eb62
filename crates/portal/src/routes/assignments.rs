//! Task assignments.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ca_portal_core::{TaskId, UserId};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::TaskAssignment;
use crate::services::{
    AssignRequest, AssignTargets, ProgramError, TaskAssignmentService, TaskChoice, TaskInput,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/assignments", get(list_assignments).post(assign_task))
}

/// Task created together with the assignment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineTask {
    pub title: String,
    pub description: Option<String>,
    pub zone: Option<String>,
    #[serde(default)]
    pub points: i32,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskRequest {
    pub task_id: Option<TaskId>,
    pub task: Option<InlineTask>,
    #[serde(default)]
    pub assignee_ids: Vec<UserId>,
    #[serde(default)]
    pub assign_to_zone: bool,
    pub zone: Option<String>,
}

impl TryFrom<AssignTaskRequest> for AssignRequest {
    type Error = ProgramError;

    fn try_from(body: AssignTaskRequest) -> Result<Self, Self::Error> {
        let task = match (body.task_id, body.task) {
            (Some(id), _) => TaskChoice::Existing(id),
            (None, Some(task)) => TaskChoice::Inline(TaskInput {
                title: task.title,
                description: task.description,
                zone: task.zone,
                points: task.points,
                active: task.active,
            }),
            (None, None) => {
                return Err(ProgramError::InvalidInput("taskId or task required".to_owned()));
            }
        };

        let targets = if body.assign_to_zone {
            AssignTargets::Zone(body.zone)
        } else if !body.assignee_ids.is_empty() {
            AssignTargets::Users(body.assignee_ids)
        } else {
            return Err(ProgramError::InvalidInput("no assignees specified".to_owned()));
        };

        Ok(Self { task, targets })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskResponse {
    pub ok: bool,
    pub assigned: u64,
    pub task_id: TaskId,
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
async fn assign_task(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<AssignTaskRequest>,
) -> Result<Json<AssignTaskResponse>, AppError> {
    let request = AssignRequest::try_from(body)?;
    let result = TaskAssignmentService::new(state.directory(), state.program())
        .assign(&user, request)
        .await?;
    Ok(Json(AssignTaskResponse {
        ok: true,
        assigned: result.assigned,
        task_id: result.task_id,
    }))
}

async fn list_assignments(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskAssignment>>, AppError> {
    Ok(Json(
        TaskAssignmentService::new(state.directory(), state.program())
            .list_for(&user)
            .await?,
    ))
}
