//! Zone reconciliation commands.
//!
//! # Usage
//!
//! ```bash
//! # Reconcile every zone that has at least one ambassador
//! cap-cli backfill
//!
//! # Reconcile one zone (any spelling the normalizer accepts)
//! cap-cli assign --zone "north zone"
//! ```

use ca_portal::services::AssignmentEngine;

use super::{CommandError, connect};

/// Run the engine for every zone.
///
/// # Errors
///
/// Returns `CommandError` if the ambassadors cannot be read.
pub async fn backfill() -> Result<u64, CommandError> {
    let store = connect().await?;
    let outcome = AssignmentEngine::new(&store).backfill_all().await?;

    tracing::info!(
        updated = outcome.updated_count,
        zones = outcome.zones.len(),
        "Backfill complete"
    );
    Ok(outcome.updated_count)
}

/// Run the engine for a single zone.
///
/// # Errors
///
/// Returns `CommandError` if the zone's head or ambassadors cannot be read.
pub async fn zone(zone: &str) -> Result<u64, CommandError> {
    let store = connect().await?;
    let outcome = AssignmentEngine::new(&store)
        .assign_zone_head_to_zone(zone)
        .await?;

    match &outcome.zone_head_name {
        Some(head) => tracing::info!(
            zone,
            head = %head,
            updated = outcome.updated_count,
            "Zone assigned"
        ),
        None => tracing::warn!(zone, "Zone has no head; existing links left untouched"),
    }
    Ok(outcome.updated_count)
}
