//! Subcommand implementations.

pub mod admin;
pub mod assign;
pub mod migrate;

use ca_portal::config::{ConfigError, database_url_from_env};
use ca_portal::db::{self, PgStore};
use thiserror::Error;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Zone(#[from] ca_portal::services::ZoneError),

    #[error(transparent)]
    Auth(#[from] ca_portal::services::AuthError),
}

/// Connect to the portal database named by `PORTAL_DATABASE_URL`.
async fn connect() -> Result<PgStore, CommandError> {
    let database_url = database_url_from_env()?;
    tracing::info!("Connecting to portal database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
