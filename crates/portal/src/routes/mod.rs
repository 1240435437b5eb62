//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Store reachability
//!
//! # Auth
//! POST   /api/auth/register         - Register (first user becomes ADMIN)
//! POST   /api/auth/login            - Password login
//! POST   /api/auth/logout           - End the session
//!
//! # Users
//! GET    /api/users/me              - Current user and their zone head
//! GET    /api/admin/users           - All users (admin)
//! PATCH  /api/admin/users/{id}      - Edit role, zone or metrics (admin)
//! POST   /api/admin/users/promote   - Set a role (admin)
//!
//! # Zones (admin)
//! GET    /api/admin/zones           - Zones with head and live counts
//! POST   /api/admin/zones           - Create a zone
//! PATCH  /api/admin/zones/{name}    - Edit a zone or install a head
//! POST   /api/admin/assign-zones    - Reconcile one zone or all of them
//!
//! # Zone head
//! GET    /api/zone/ambassadors      - Linked ambassadors
//! GET    /api/zone/stats            - Dashboard numbers
//!
//! # Program
//! GET    /api/tasks                 - Visible tasks
//! POST   /api/tasks                 - Create (admin)
//! PATCH  /api/tasks/{id}            - Edit (admin)
//! DELETE /api/tasks/{id}            - Delete (admin)
//! POST   /api/submissions           - Submit proof
//! GET    /api/submissions           - Review queue (admin, zone head)
//! GET    /api/submissions/me        - Own submissions
//! PATCH  /api/submissions/{id}      - Approve or reject
//! GET    /api/leaderboard           - Top ambassadors
//! POST   /api/assignments           - Assign a task (admin, zone head)
//! GET    /api/assignments           - Assignments visible to the caller
//! GET    /api/admin/overview        - Programme totals per zone (admin)
//! ```

pub mod assignments;
pub mod auth;
pub mod health;
pub mod leaderboard;
pub mod overview;
pub mod submissions;
pub mod tasks;
pub mod users;
pub mod zone_head;
pub mod zones;

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::service::SignedCookie;
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::error::AppError;
use crate::state::AppState;

/// All routes, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(zones::router())
        .merge(zone_head::router())
        .merge(tasks::router())
        .merge(submissions::router())
        .merge(leaderboard::router())
        .merge(assignments::router())
        .merge(overview::router())
}

/// The complete application: routes, sessions and request tracing.
///
/// Sentry layers are added by the binary so tests can build the router
/// without a Sentry client.
pub fn build_router<S>(state: AppState, sessions: SessionManagerLayer<S, SignedCookie>) -> Router
where
    S: SessionStore + Clone,
{
    routes()
        .layer(sessions)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Session write failures are server errors.
pub(crate) fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}
