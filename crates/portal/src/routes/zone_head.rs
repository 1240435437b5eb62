//! Zone head dashboard.

use axum::{Json, Router, extract::State, routing::get};

use crate::error::AppError;
use crate::middleware::RequireZoneHead;
use crate::models::Ambassador;
use crate::services::reports::{self, ZoneStats};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/zone/ambassadors", get(ambassadors))
        .route("/api/zone/stats", get(stats))
}

async fn ambassadors(
    RequireZoneHead(head): RequireZoneHead,
    State(state): State<AppState>,
) -> Result<Json<Vec<Ambassador>>, AppError> {
    Ok(Json(reports::zone_ambassadors(state.directory(), &head).await?))
}

async fn stats(
    RequireZoneHead(head): RequireZoneHead,
    State(state): State<AppState>,
) -> Result<Json<ZoneStats>, AppError> {
    Ok(Json(
        reports::zone_stats(state.directory(), state.program(), &head).await?,
    ))
}
