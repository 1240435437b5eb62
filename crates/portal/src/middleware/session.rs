//! Session middleware configuration.
//!
//! Sessions live in `portal.session` via tower-sessions. Cookies are signed
//! with the configured secret, `SameSite=Lax`, HTTP-only, and `Secure`
//! whenever the portal is served over HTTPS.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::PortalConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ca_portal_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum SessionSetupError {
    #[error("session secret is not a valid signing key: {0}")]
    InvalidKey(String),

    #[error("invalid session store location: {0}")]
    Store(String),
}

/// Build the session layer over any store.
///
/// # Errors
///
/// Returns `SessionSetupError::InvalidKey` if the secret is shorter than a
/// signing key.
pub fn session_layer<S>(
    store: S,
    config: &PortalConfig,
) -> Result<SessionManagerLayer<S, SignedCookie>, SessionSetupError>
where
    S: SessionStore + Clone,
{
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())
        .map_err(|e| SessionSetupError::InvalidKey(e.to_string()))?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}

/// Create the session layer with the `PostgreSQL` store.
///
/// # Arguments
///
/// * `pool` - `PostgreSQL` connection pool
/// * `config` - Portal configuration (secret and HTTPS mode)
///
/// # Errors
///
/// Returns `SessionSetupError` if the store location or the key is invalid.
pub fn create_session_layer(
    pool: &PgPool,
    config: &PortalConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, SessionSetupError> {
    // The table is created by the portal migrations.
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("portal")
        .map_err(|e| SessionSetupError::Store(e.to_string()))?
        .with_table_name("session")
        .map_err(|e| SessionSetupError::Store(e.to_string()))?;

    session_layer(store, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tower_sessions::MemoryStore;

    fn config(secret: &str) -> PortalConfig {
        PortalConfig {
            database_url: SecretString::from("postgres://localhost/portal"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from(secret.to_owned()),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = session_layer(MemoryStore::default(), &config(&"a".repeat(32)));
        assert!(matches!(result, Err(SessionSetupError::InvalidKey(_))));
    }

    #[test]
    fn test_full_length_secret_accepted() {
        assert!(session_layer(MemoryStore::default(), &config(&"a".repeat(64))).is_ok());
    }
}
