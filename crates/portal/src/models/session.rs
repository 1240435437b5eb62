//! Session-related types for authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use ca_portal_core::{Email, Role, UserId};

use super::Ambassador;

/// Session-stored identity.
///
/// Only used to find the user again; the role is re-read from the store on
/// every request so promotions and demotions apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    /// Role at login time. Informational only.
    pub role: Role,
}

impl From<&Ambassador> for CurrentUser {
    fn from(user: &Ambassador) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
