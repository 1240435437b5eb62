//! Admin dashboard.

use axum::{Json, Router, extract::State, routing::get};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::reports::{self, AdminOverview};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/overview", get(overview))
}

async fn overview(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminOverview>, AppError> {
    Ok(Json(
        reports::admin_overview(state.directory(), state.program()).await?,
    ))
}
