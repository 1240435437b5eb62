//! Zone service error types.

use thiserror::Error;

use ca_portal_core::ZoneName;

use crate::db::RepositoryError;

/// Errors from the assignment engine, role transitions and the zone directory.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// Another zone head already leads the target zone. Nothing was written.
    #[error("zone already has a head: {zone}")]
    Conflict { zone: ZoneName },

    /// Zone name that normalizes to nothing.
    #[error("invalid zone: {0:?}")]
    InvalidZone(String),

    /// A campus ambassador's state resolves to another zone than the one
    /// requested. Their state always wins, so the edit is refused.
    #[error("state places the user in {resolved}, not {requested}")]
    StateMismatch {
        requested: ZoneName,
        resolved: ZoneName,
    },

    /// Zone record with the same canonical name already exists.
    #[error("zone already exists: {0}")]
    DuplicateZone(ZoneName),

    #[error("zone not found: {0}")]
    ZoneNotFound(String),

    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
