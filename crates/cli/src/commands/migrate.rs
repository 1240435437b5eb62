//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cap-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PORTAL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/portal/migrations/`:
//! ```text
//! migrations/
//! ├── 20250601000000_portal_schema.sql
//! └── 20250601000100_sessions.sql
//! ```

use super::{CommandError, connect};

/// Run the portal migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let store = connect().await?;

    tracing::info!("Running portal migrations...");
    sqlx::migrate!("../portal/migrations")
        .run(store.pool())
        .await?;

    tracing::info!("Portal migrations complete!");
    Ok(())
}
