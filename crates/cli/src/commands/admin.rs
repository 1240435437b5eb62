//! Admin account management.
//!
//! # Usage
//!
//! ```bash
//! cap-cli admin create -e admin@example.org -p 'long passphrase' -n "Portal Admin"
//! ```
//!
//! Creating an admin here also claims the bootstrap flag, so the next web
//! registration is an ordinary ambassador.

use ca_portal::services::AuthService;
use ca_portal_core::UserId;

use super::{CommandError, connect};

/// Create an `ADMIN` account.
///
/// # Errors
///
/// Returns `CommandError::Auth` for an invalid email, a weak password or an
/// email that is already registered.
pub async fn create(
    email: &str,
    password: &str,
    name: Option<String>,
) -> Result<UserId, CommandError> {
    let store = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let admin = AuthService::new(&store)
        .create_admin(email, password, name)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        admin.id,
        admin.email
    );
    Ok(admin.id)
}
