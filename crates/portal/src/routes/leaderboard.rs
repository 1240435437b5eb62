//! Public leaderboard.

use axum::{Json, Router, extract::State, routing::get};

use crate::error::AppError;
use crate::services::reports::{self, LeaderboardEntry};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/leaderboard", get(leaderboard))
}

async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(reports::leaderboard(state.directory()).await?))
}
