//! Campus Ambassador portal library.
//!
//! The server binary is a thin wrapper around this crate; the CLI and the
//! integration tests use the same services and stores.
//!
//! # Layers
//!
//! - [`db`] - store traits with `PostgreSQL` and in-memory backends
//! - [`services`] - zone assignment, role transitions, zones, auth, program
//! - [`routes`] - axum handlers; [`routes::build_router`] assembles the app
//! - [`middleware`] - sessions and role extractors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
