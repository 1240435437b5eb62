//! Admin zone directory and manual reconciliation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use ca_portal_core::{UserId, ZoneName};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::Zone;
use crate::services::{AssignmentEngine, CreateZone, UpdateZone, ZoneDirectory, ZoneSummary};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/zones", get(list_zones).post(create_zone))
        .route("/api/admin/zones/{name}", patch(update_zone))
        .route("/api/admin/assign-zones", post(assign_zones))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateZoneRequest {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub pin_prefixes: Vec<String>,
    pub head_user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateZoneRequest {
    pub display_name: Option<String>,
    pub pin_prefixes: Option<Vec<String>>,
    pub head_user_id: Option<UserId>,
}

/// Body of `POST /api/admin/assign-zones`; `{}` reconciles every zone.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub zone: Option<String>,
}

/// Result of a manual reconciliation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub updated: u64,
    /// Zones that were reconciled.
    pub zones: Vec<ZoneName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_head_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_head_name: Option<String>,
}

async fn list_zones(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ZoneSummary>>, AppError> {
    Ok(Json(ZoneDirectory::new(state.directory()).list().await?))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn create_zone(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<Zone>), AppError> {
    let zone = ZoneDirectory::new(state.directory())
        .create(CreateZone {
            name: body.name,
            display_name: body.display_name,
            pin_prefixes: body.pin_prefixes,
            head_user_id: body.head_user_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

#[instrument(skip(state, body), fields(admin_id = %admin.id))]
async fn update_zone(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<UpdateZoneRequest>,
) -> Result<Json<Zone>, AppError> {
    let zone = ZoneDirectory::new(state.directory())
        .update(
            &name,
            UpdateZone {
                display_name: body.display_name,
                pin_prefixes: body.pin_prefixes,
                head_user_id: body.head_user_id,
            },
        )
        .await?;
    Ok(Json(zone))
}

/// Reconcile one zone when `zone` is given, every zone otherwise.
///
/// A zone that does not normalize reconciles nothing and reports zero.
#[instrument(skip(state, request), fields(admin_id = %admin.id))]
async fn assign_zones(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, AppError> {
    let engine = AssignmentEngine::new(state.directory());

    let response = match request.zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
        Some(zone) => {
            let outcome = engine.assign_zone_head_to_zone(zone).await?;
            AssignResponse {
                updated: outcome.updated_count,
                zones: ca_portal_core::normalize_zone(zone).into_iter().collect(),
                zone_head_id: outcome.zone_head_id,
                zone_head_name: outcome.zone_head_name,
            }
        }
        None => {
            let outcome = engine.backfill_all().await?;
            AssignResponse {
                updated: outcome.updated_count,
                zones: outcome.zones,
                zone_head_id: None,
                zone_head_name: None,
            }
        }
    };

    info!(updated = response.updated, "manual assignment finished");
    Ok(Json(response))
}
