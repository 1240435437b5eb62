//! Campus Ambassador Portal Core - Shared types library.
//!
//! This crate provides the types and pure logic shared by every portal component:
//! - `portal` - HTTP API server and reconciliation services
//! - `cli` - Command-line tools for migrations and one-off repairs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Zone normalization lives here so the server, the CLI and the
//! tests all agree on what a canonical zone is.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles and statuses
//! - [`zone`] - Zone normalizer, state lookup and the zone resolution chain
//! - [`referral`] - Deterministic referral code candidates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod referral;
pub mod types;
pub mod zone;

pub use types::*;
pub use zone::{
    EmptyZoneName, Region, ZoneName, ZoneResolution, ZoneSource, normalize_zone,
    resolve_head_zone, resolve_promotion_target, resolve_zone, zone_from_state,
};
