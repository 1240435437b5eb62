//! HTTP middleware for the portal.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Session layer (tower-sessions, signed cookie)
//!
//! Authorization is done by extractors in [`auth`] rather than a guard
//! layer, so each handler states the role it needs in its signature.

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, RequireAdmin, RequireUser, RequireZoneHead, clear_current_user,
    set_current_user,
};
pub use session::{SESSION_COOKIE_NAME, SessionSetupError, create_session_layer, session_layer};
