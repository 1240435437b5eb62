//! Unified error handling for the portal API.
//!
//! Every handler returns `Result<_, AppError>`. Errors render as
//! `{"error": "..."}` with the matching status code; server errors are
//! reported to Sentry and their details are never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, ProgramError, UserUpdateError, ZoneError};

/// Application-level error type for the portal.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Write rejected by a uniqueness or state rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::NotFound(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::BadRequest(m)
            | Self::Conflict(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Portal request error"
            );
        }

        let body = Json(json!({ "error": self.client_message() }));
        (self.status(), body).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound("not found".to_owned()),
            RepositoryError::Conflict(m) => Self::Conflict(m),
            other => Self::Database(other),
        }
    }
}

impl From<ZoneError> for AppError {
    fn from(e: ZoneError) -> Self {
        match e {
            // Duplicate heads are a 400, as the admin UI has always expected.
            ZoneError::Conflict { .. }
            | ZoneError::InvalidZone(_)
            | ZoneError::StateMismatch { .. } => Self::BadRequest(e.to_string()),
            ZoneError::DuplicateZone(_) => Self::Conflict(e.to_string()),
            ZoneError::ZoneNotFound(_) | ZoneError::UserNotFound => Self::NotFound(e.to_string()),
            ZoneError::Repository(inner) => inner.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => Self::BadRequest(e.to_string()),
            AuthError::InvalidCredentials => Self::Unauthorized("invalid credentials".to_owned()),
            AuthError::UserNotFound => Self::NotFound(e.to_string()),
            AuthError::UserAlreadyExists => Self::Conflict(e.to_string()),
            AuthError::Zone(inner) => inner.into(),
            AuthError::Repository(inner) => inner.into(),
            AuthError::PasswordHash => Self::Internal(e.to_string()),
        }
    }
}

impl From<ProgramError> for AppError {
    fn from(e: ProgramError) -> Self {
        match e {
            ProgramError::InvalidInput(_) | ProgramError::TaskInactive => {
                Self::BadRequest(e.to_string())
            }
            ProgramError::TaskNotFound | ProgramError::SubmissionNotFound => {
                Self::NotFound(e.to_string())
            }
            ProgramError::Forbidden => Self::Forbidden(e.to_string()),
            ProgramError::AlreadyReviewed => Self::Conflict(e.to_string()),
            ProgramError::Repository(inner) => inner.into(),
        }
    }
}

impl From<UserUpdateError> for AppError {
    fn from(e: UserUpdateError) -> Self {
        match e {
            UserUpdateError::Negative(_) => Self::BadRequest(e.to_string()),
            UserUpdateError::Zone(inner) => inner.into(),
        }
    }
}

/// Set the Sentry user context for the signed-in user.
pub fn set_sentry_user(user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
