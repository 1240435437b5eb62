//! Proof submissions and review.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use ca_portal_core::{ReviewAction, SubmissionId, TaskId};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::Submission;
use crate::services::SubmissionService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", get(review_queue).post(submit))
        .route("/api/submissions/me", get(my_submissions))
        .route("/api/submissions/{id}", patch(review))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub task_id: TaskId,
    pub media_url: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub points: Option<i32>,
    pub note: Option<String>,
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
async fn submit(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let submission = SubmissionService::new(state.program())
        .submit(&user, body.task_id, &body.media_url, body.note)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Everything for admins, the head's zone for zone heads, 403 otherwise.
async fn review_queue(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, AppError> {
    Ok(Json(
        SubmissionService::new(state.program())
            .list_for_reviewer(&user)
            .await?,
    ))
}

async fn my_submissions(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, AppError> {
    Ok(Json(
        SubmissionService::new(state.program())
            .list_mine(&user)
            .await?,
    ))
}

#[instrument(skip(state, body), fields(reviewer_id = %user.id))]
async fn review(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<SubmissionId>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Submission>, AppError> {
    let submission = SubmissionService::new(state.program())
        .review(&user, id, body.action, body.points, body.note)
        .await?;
    Ok(Json(submission))
}
