//! Authentication extractors.
//!
//! The session only stores who is signed in. Every extractor reloads the
//! user from the directory, so a promotion or demotion takes effect on the
//! next request without logging out.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use ca_portal_core::Role;

use crate::error::{AppError, set_sentry_user};
use crate::models::{Ambassador, AmbassadorLookup, CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireUser(user): RequireUser) -> Json<Ambassador> {
///     Json(user)
/// }
/// ```
pub struct RequireUser(pub Ambassador);

/// Extractor that requires an `ADMIN`.
pub struct RequireAdmin(pub Ambassador);

/// Extractor that requires a `ZONE_HEAD`.
pub struct RequireZoneHead(pub Ambassador);

/// Error returned when a request lacks the required identity.
#[derive(Debug)]
pub enum AuthRejection {
    /// No session, or the session user no longer exists.
    Unauthorized,
    /// Signed in with the wrong role.
    Forbidden(&'static str),
    /// The user could not be loaded.
    Store(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::Unauthorized("not signed in".to_owned()),
            Self::Forbidden(message) => AppError::Forbidden(message.to_owned()),
            Self::Store(e) => e,
        }
        .into_response()
    }
}

async fn load_user(parts: &Parts, state: &AppState) -> Result<Ambassador, AuthRejection> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    let current: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or(AuthRejection::Unauthorized)?;

    let user = state
        .directory()
        .find_ambassador(AmbassadorLookup::Id(current.id))
        .await
        .map_err(|e| AuthRejection::Store(e.into()))?
        .ok_or(AuthRejection::Unauthorized)?;

    set_sentry_user(user.id.as_i32(), Some(user.email.as_str()));
    Ok(user)
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        load_user(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = load_user(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AuthRejection::Forbidden("admin only"));
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireZoneHead {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = load_user(parts, state).await?;
        if user.role != Role::ZoneHead {
            return Err(AuthRejection::Forbidden("zone heads only"));
        }
        Ok(Self(user))
    }
}

/// Helper to set the current user in the session.
///
/// Cycles the session id first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &Ambassador,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(user))
        .await
}

/// Helper to end the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
