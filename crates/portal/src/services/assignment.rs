//! Zone assignment engine and batch backfill.
//!
//! The engine is the single place that writes `zone_head_id` and
//! `zone_head_name` on campus ambassadors in bulk. Given a zone it:
//!
//! 1. resolves the zone's head (zone record first, then a scan of zone heads,
//!    repairing a head's stored zone if it is not canonical),
//! 2. writes the canonical zone, and the head link if one was found, on every
//!    CA whose resolved zone is the target.
//!
//! When the zone has no head, a CA keeps an existing link only if it still
//! points at a zone head who leads the target zone or whose zone record
//! covers the CA's pin code. Any other link is cleared.
//!
//! Writes are best effort: a record that fails to update is logged and
//! skipped, and the returned count only includes successful writes. Running
//! the engine twice with no writes in between yields the same result.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use ca_portal_core::{Role, UserId, ZoneName, normalize_zone};

use super::ZoneError;
use crate::db::DirectoryStore;
use crate::models::{Ambassador, AmbassadorLookup, AmbassadorPatch, HeadLink};

/// Result of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    /// Ambassador records written.
    pub updated_count: u64,
    pub zone_head_id: Option<UserId>,
    pub zone_head_name: Option<String>,
}

/// Result of a backfill over every zone in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOutcome {
    pub updated_count: u64,
    /// Zones processed, in order.
    pub zones: Vec<ZoneName>,
}

/// Reconciles ambassadors with the head of their zone.
pub struct AssignmentEngine<'a> {
    directory: &'a dyn DirectoryStore,
}

impl<'a> AssignmentEngine<'a> {
    #[must_use]
    pub const fn new(directory: &'a dyn DirectoryStore) -> Self {
        Self { directory }
    }

    /// Normalize `zone_raw` and reconcile that zone.
    ///
    /// Input that normalizes to nothing is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Repository` if the head or the ambassadors cannot
    /// be read. Individual write failures are logged and skipped.
    pub async fn assign_zone_head_to_zone(
        &self,
        zone_raw: &str,
    ) -> Result<AssignmentOutcome, ZoneError> {
        let Some(zone) = normalize_zone(zone_raw) else {
            debug!(zone_raw, "zone does not normalize, nothing to assign");
            return Ok(AssignmentOutcome::default());
        };
        self.assign(&zone).await
    }

    /// Reconcile an already canonical zone.
    ///
    /// # Errors
    ///
    /// See [`Self::assign_zone_head_to_zone`].
    #[instrument(skip(self, zone), fields(zone = %zone))]
    pub async fn assign(&self, zone: &ZoneName) -> Result<AssignmentOutcome, ZoneError> {
        let head = self.resolve_head(zone).await?;

        let ambassadors = self.directory.find_ambassadors_by_role(Role::Ca).await?;
        let members: Vec<&Ambassador> = ambassadors
            .iter()
            .filter(|a| a.canonical_zone() == *zone)
            .collect();
        let stale = match head {
            Some(_) => BTreeSet::new(),
            None => self.stale_links(zone, &members).await?,
        };

        let patch = AmbassadorPatch::assign(zone, head.clone());
        let unlink = AmbassadorPatch {
            zone_head: Some(None),
            ..patch.clone()
        };

        let mut updated_count = 0;
        for ambassador in members {
            let patch = if stale.contains(&ambassador.id) {
                &unlink
            } else {
                &patch
            };
            match self.directory.update_ambassador(ambassador.id, patch).await {
                Ok(_) => updated_count += 1,
                Err(e) => {
                    warn!(user_id = %ambassador.id, error = %e, "failed to assign ambassador");
                }
            }
        }

        info!(
            updated = updated_count,
            unlinked = stale.len(),
            head_id = head.as_ref().map(|h| h.id.as_i32()),
            "zone assignment complete"
        );

        Ok(AssignmentOutcome {
            updated_count,
            zone_head_id: head.as_ref().map(|h| h.id),
            zone_head_name: head.and_then(|h| h.name),
        })
    }

    /// Head of `zone`, if any.
    ///
    /// The zone record wins. Without one, the first zone head (oldest first)
    /// whose headed zone resolves to `zone` is used, and their stored zone is
    /// rewritten to the canonical value if it differs.
    async fn resolve_head(&self, zone: &ZoneName) -> Result<Option<HeadLink>, ZoneError> {
        if let Some(mut link) = self
            .directory
            .find_zone_by_name(zone)
            .await?
            .and_then(|record| record.head())
        {
            if link.name.is_none() {
                link.name = self
                    .directory
                    .find_ambassador(AmbassadorLookup::Id(link.id))
                    .await?
                    .map(|head| head.display_name().to_owned());
            }
            return Ok(Some(link));
        }

        let heads = self.directory.find_ambassadors_by_role(Role::ZoneHead).await?;
        let Some(head) = heads.iter().find(|h| h.headed_zone().as_ref() == Some(zone)) else {
            debug!("zone has no head");
            return Ok(None);
        };

        if head.zone.as_deref() != Some(zone.as_str()) {
            self.heal_head_zone(head, zone).await;
        }

        Ok(Some(head.as_head_link()))
    }

    /// Members of a headless `zone` whose link no longer belongs to them.
    async fn stale_links(
        &self,
        zone: &ZoneName,
        members: &[&Ambassador],
    ) -> Result<BTreeSet<UserId>, ZoneError> {
        if members.iter().all(|a| a.zone_head_id.is_none()) {
            return Ok(BTreeSet::new());
        }
        let heads = self.directory.find_ambassadors_by_role(Role::ZoneHead).await?;
        let zones = self.directory.list_zones().await?;

        let still_valid = |ambassador: &Ambassador, head_id: UserId| {
            let leads_zone = heads
                .iter()
                .any(|h| h.id == head_id && h.headed_zone().as_ref() == Some(zone));
            let covers_pin = ambassador.pin_code.as_deref().is_some_and(|pin| {
                zones
                    .iter()
                    .any(|z| z.head_user_id == Some(head_id) && z.matches_pin(pin))
            });
            leads_zone || covers_pin
        };

        Ok(members
            .iter()
            .copied()
            .filter(|a| a.zone_head_id.is_some_and(|head_id| !still_valid(*a, head_id)))
            .map(|a| a.id)
            .collect())
    }

    async fn heal_head_zone(&self, head: &Ambassador, zone: &ZoneName) {
        let patch = AmbassadorPatch {
            zone: Some(Some(zone.to_string())),
            ..AmbassadorPatch::default()
        };
        match self.directory.update_ambassador(head.id, &patch).await {
            Ok(_) => info!(head_id = %head.id, stored = ?head.zone, "rewrote zone head's zone"),
            Err(e) => warn!(head_id = %head.id, error = %e, "failed to rewrite zone head's zone"),
        }
    }

    /// Run the engine once for every zone a CA currently resolves to.
    ///
    /// Zones are processed in sorted order. A zone that fails as a whole is
    /// logged and skipped; the backfill can simply be run again.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Repository` if the ambassadors cannot be listed.
    #[instrument(skip(self))]
    pub async fn backfill_all(&self) -> Result<BackfillOutcome, ZoneError> {
        let ambassadors = self.directory.find_ambassadors_by_role(Role::Ca).await?;
        let zones: BTreeSet<ZoneName> = ambassadors.iter().map(Ambassador::canonical_zone).collect();

        let mut outcome = BackfillOutcome::default();
        for zone in zones {
            match self.assign(&zone).await {
                Ok(result) => outcome.updated_count += result.updated_count,
                Err(e) => warn!(zone = %zone, error = %e, "zone backfill failed, skipping"),
            }
            outcome.zones.push(zone);
        }

        info!(
            updated = outcome.updated_count,
            zones = outcome.zones.len(),
            "backfill complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewAmbassador, ZonePatch};
    use ca_portal_core::Email;

    async fn user(
        store: &MemoryStore,
        email: &str,
        role: Role,
        state: Option<&str>,
        zone: Option<&str>,
    ) -> Ambassador {
        let mut new = NewAmbassador::new(Email::parse(email).unwrap(), "x".to_owned(), role);
        new.state = state.map(str::to_owned);
        new.zone = zone.and_then(ZoneName::parse);
        store.create_ambassador(&new).await.unwrap()
    }

    async fn reload(store: &MemoryStore, id: UserId) -> Ambassador {
        store
            .find_ambassador(AmbassadorLookup::Id(id))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_unnormalizable_zone_is_noop() {
        let store = MemoryStore::new();
        let outcome = AssignmentEngine::new(&store)
            .assign_zone_head_to_zone("  ..  ")
            .await
            .unwrap();
        assert_eq!(outcome, AssignmentOutcome::default());
    }

    #[tokio::test]
    async fn test_links_by_state_and_heals_head() {
        let store = MemoryStore::new();
        let mut head_new =
            NewAmbassador::new(Email::parse("head@x.io").unwrap(), "x".to_owned(), Role::ZoneHead);
        head_new.state = Some("Punjab".to_owned());
        let head = store.create_ambassador(&head_new).await.unwrap();
        let ca = user(&store, "ca@x.io", Role::Ca, Some("Haryana"), None).await;
        let other = user(&store, "other@x.io", Role::Ca, Some("Kerala"), None).await;

        let outcome = AssignmentEngine::new(&store)
            .assign_zone_head_to_zone("north zone")
            .await
            .unwrap();

        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.zone_head_id, Some(head.id));

        let ca = reload(&store, ca.id).await;
        assert_eq!(ca.zone.as_deref(), Some("NORTH"));
        assert_eq!(ca.zone_head_id, Some(head.id));
        assert_eq!(ca.zone_head_name.as_deref(), Some("head@x.io"));
        assert_eq!(reload(&store, other.id).await.zone_head_id, None);
        assert_eq!(reload(&store, head.id).await.zone.as_deref(), Some("NORTH"));
    }

    #[tokio::test]
    async fn test_zone_record_head_wins() {
        let store = MemoryStore::new();
        let scanned = user(&store, "a@x.io", Role::ZoneHead, None, Some("south")).await;
        let recorded = user(&store, "b@x.io", Role::ZoneHead, None, Some("south")).await;
        store
            .upsert_zone(
                &ZoneName::parse("SOUTH").unwrap(),
                &ZonePatch::set_head(HeadLink {
                    id: recorded.id,
                    name: None,
                }),
            )
            .await
            .unwrap();

        let outcome = AssignmentEngine::new(&store)
            .assign_zone_head_to_zone("SOUTH")
            .await
            .unwrap();
        assert_eq!(outcome.zone_head_id, Some(recorded.id));
        assert_ne!(outcome.zone_head_id, Some(scanned.id));
        assert_eq!(outcome.zone_head_name.as_deref(), Some("b@x.io"));
    }

    #[tokio::test]
    async fn test_headless_zone_still_canonicalizes() {
        let store = MemoryStore::new();
        let ca = user(&store, "ca@x.io", Role::Ca, None, Some("east zone")).await;

        let outcome = AssignmentEngine::new(&store).assign_zone_head_to_zone("East").await.unwrap();

        assert_eq!(outcome.updated_count, 1);
        assert_eq!(outcome.zone_head_id, None);
        assert_eq!(reload(&store, ca.id).await.zone.as_deref(), Some("EAST"));
    }

    #[tokio::test]
    async fn test_headless_zone_drops_foreign_links() {
        let store = MemoryStore::new();
        let north = user(&store, "n@x.io", Role::ZoneHead, Some("Punjab"), Some("NORTH")).await;
        let by_pin = user(&store, "p@x.io", Role::ZoneHead, None, Some("CENTRAL")).await;
        store
            .upsert_zone(
                &ZoneName::parse("CENTRAL").unwrap(),
                &ZonePatch {
                    pin_prefixes: Some(vec!["46".to_owned()]),
                    ..ZonePatch::set_head(by_pin.as_head_link())
                },
            )
            .await
            .unwrap();
        let moved = user(&store, "k@x.io", Role::Ca, Some("Kerala"), Some("NORTH")).await;
        let mut pinned = NewAmbassador::new(Email::parse("q@x.io").unwrap(), "x".to_owned(), Role::Ca);
        pinned.state = Some("Tamil Nadu".to_owned());
        pinned.pin_code = Some("462001".to_owned());
        let pinned = store.create_ambassador(&pinned).await.unwrap();
        store
            .update_ambassador(moved.id, &AmbassadorPatch::link(north.as_head_link()))
            .await
            .unwrap();
        store
            .update_ambassador(pinned.id, &AmbassadorPatch::link(by_pin.as_head_link()))
            .await
            .unwrap();

        let outcome = AssignmentEngine::new(&store).assign_zone_head_to_zone("SOUTH").await.unwrap();

        assert_eq!(outcome.updated_count, 2);
        assert_eq!(outcome.zone_head_id, None);
        let moved = reload(&store, moved.id).await;
        assert_eq!(moved.zone.as_deref(), Some("SOUTH"));
        assert_eq!(moved.zone_head_id, None);
        assert_eq!(moved.zone_head_name, None);
        assert_eq!(reload(&store, pinned.id).await.zone_head_id, Some(by_pin.id));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let store = MemoryStore::new();
        user(&store, "h@x.io", Role::ZoneHead, Some("Goa"), None).await;
        user(&store, "a@x.io", Role::Ca, Some("Gujarat"), None).await;
        user(&store, "b@x.io", Role::Ca, None, Some("west")).await;

        let engine = AssignmentEngine::new(&store);
        let first = engine.assign_zone_head_to_zone("WEST").await.unwrap();
        let snapshot: Vec<_> = store
            .list_ambassadors()
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.id, a.zone, a.zone_head_id, a.zone_head_name))
            .collect();
        let second = engine.assign_zone_head_to_zone("WEST").await.unwrap();
        let again: Vec<_> = store
            .list_ambassadors()
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.id, a.zone, a.zone_head_id, a.zone_head_name))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.updated_count, 2);
        assert_eq!(snapshot, again);
    }

    #[tokio::test]
    async fn test_backfill_covers_every_zone() {
        let store = MemoryStore::new();
        user(&store, "a@x.io", Role::Ca, Some("Kerala"), None).await;
        user(&store, "b@x.io", Role::Ca, Some("Bihar"), None).await;
        user(&store, "c@x.io", Role::Ca, None, None).await;
        user(&store, "admin@x.io", Role::Admin, Some("Goa"), None).await;

        let outcome = AssignmentEngine::new(&store).backfill_all().await.unwrap();

        assert_eq!(outcome.updated_count, 3);
        let zones: Vec<&str> = outcome.zones.iter().map(ZoneName::as_str).collect();
        assert_eq!(zones, vec!["EAST", "INTERNATIONAL", "SOUTH"]);
    }
}
