//! Registration, login and logout.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::session_error;
use crate::error::{AppError, clear_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::Ambassador;
use crate::services::{AuthService, Registration};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zone: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(r: RegisterRequest) -> Self {
        Self {
            email: r.email,
            password: r.password,
            full_name: r.full_name,
            phone: r.phone,
            college: r.college,
            pin_code: r.pin_code,
            city: r.city,
            state: r.state,
            zone: r.zone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an account. The very first account becomes the admin.
#[instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Ambassador>), AppError> {
    let user = AuthService::new(state.directory())
        .register(body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Ambassador>, AppError> {
    let user = AuthService::new(state.directory())
        .login(&body.email, &body.password)
        .await?;

    set_current_user(&session, &user)
        .await
        .map_err(|e| session_error(&e))?;

    tracing::info!(user_id = %user.id, role = %user.role, "user signed in");
    Ok(Json(user))
}

async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session)
        .await
        .map_err(|e| session_error(&e))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
