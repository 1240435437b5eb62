//! Integration tests for the Campus Ambassador portal.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ca-portal-integration-tests
//! ```
//!
//! Everything runs in process against the in-memory store, so no database
//! or server is needed.
//!
//! # Test Categories
//!
//! - `zone_scenarios` - promotion, reconciliation and backfill flows
//! - `api` - the HTTP router end to end, sessions included

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use ca_portal::config::PortalConfig;
use ca_portal::db::{DirectoryStore, MemoryStore};
use ca_portal::middleware::session_layer;
use ca_portal::models::{Ambassador, AmbassadorLookup, AmbassadorPatch, NewAmbassador};
use ca_portal::routes::build_router;
use ca_portal::state::AppState;
use ca_portal_core::{Email, Role, UserId, ZoneName};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Password used by every seeded account.
pub const PASSWORD: &str = "correct horse battery";

/// Configuration for in-process tests.
#[must_use]
pub fn test_config() -> PortalConfig {
    PortalConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("q7Vb2Lm9Xz4Kd8Pw3Rt6Yh1Jn5Fc0GsA".repeat(2)),
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Profile fields for a seeded ambassador.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profile<'a> {
    pub name: Option<&'a str>,
    pub state: Option<&'a str>,
    pub pin_code: Option<&'a str>,
    /// Stored zone, written as-is.
    pub zone: Option<&'a str>,
}

/// Insert a user straight into the store, bypassing the engine.
///
/// # Panics
///
/// Panics if the email is invalid or already taken.
pub async fn seed(store: &MemoryStore, email: &str, role: Role, profile: Profile<'_>) -> Ambassador {
    let mut new = NewAmbassador::new(
        Email::parse(email).expect("valid email"),
        "not-a-real-hash".to_owned(),
        role,
    );
    new.full_name = profile.name.map(str::to_owned);
    new.state = profile.state.map(str::to_owned);
    new.pin_code = profile.pin_code.map(str::to_owned);
    let user = store.create_ambassador(&new).await.expect("seed user");

    match profile.zone {
        Some(zone) => store
            .update_ambassador(
                user.id,
                &AmbassadorPatch {
                    zone: Some(Some(zone.to_owned())),
                    ..AmbassadorPatch::default()
                },
            )
            .await
            .expect("seed zone"),
        None => user,
    }
}

/// Re-read a user.
///
/// # Panics
///
/// Panics if the user does not exist.
pub async fn reload(store: &MemoryStore, id: UserId) -> Ambassador {
    store
        .find_ambassador(AmbassadorLookup::Id(id))
        .await
        .expect("lookup")
        .expect("user exists")
}

/// Canonical zone name for assertions.
///
/// # Panics
///
/// Panics on an empty name.
#[must_use]
pub fn zone(name: &str) -> ZoneName {
    ZoneName::parse(name).expect("zone name")
}

/// Response captured by [`TestApp::request`].
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// `name=value` of the session cookie, when the response set one.
    pub cookie: Option<String>,
}

/// The full router over a fresh in-memory store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// # Panics
    ///
    /// Panics if the session layer rejects the test secret.
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let sessions = session_layer(tower_sessions::MemoryStore::default(), &config)
            .expect("session layer");
        let router = build_router(AppState::new(config, store.clone()), sessions);
        Self { store, router }
    }

    /// Send one request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            body,
            cookie,
        }
    }

    /// Register through the API.
    pub async fn register(&self, email: &str, state: Option<&str>) -> TestResponse {
        self.request(
            Method::POST,
            "/api/auth/register",
            Some(serde_json::json!({
                "email": email,
                "password": PASSWORD,
                "fullName": email.split('@').next(),
                "state": state,
            })),
            None,
        )
        .await
    }

    /// Log in and return the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the login fails or sets no cookie.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/auth/login",
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {:?}", response.body);
        response.cookie.expect("session cookie")
    }
}
