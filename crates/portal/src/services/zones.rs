//! Zone directory: create, edit and list zone records.

use serde::Serialize;
use tracing::{info, instrument};

use ca_portal_core::{Role, UserId, ZoneName, normalize_zone};

use super::{AssignmentEngine, RoleService, ZoneError};
use crate::db::{DirectoryStore, RepositoryError};
use crate::models::{AmbassadorFilter, AmbassadorPatch, NewZone, Zone, ZonePatch, clean_pin_prefixes};

/// A zone with its head and live membership counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    #[serde(flatten)]
    pub zone: Zone,
    /// Head display name, if the zone has a head.
    pub head: Option<String>,
    /// CAs whose stored zone is this zone.
    pub ambassadors: usize,
    /// CAs linked to this zone's head.
    pub linked: usize,
}

/// Input for [`ZoneDirectory::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateZone {
    pub name: String,
    pub display_name: Option<String>,
    pub pin_prefixes: Vec<String>,
    pub head_user_id: Option<UserId>,
}

/// Input for [`ZoneDirectory::update`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateZone {
    pub display_name: Option<String>,
    pub pin_prefixes: Option<Vec<String>>,
    pub head_user_id: Option<UserId>,
}

pub struct ZoneDirectory<'a> {
    directory: &'a dyn DirectoryStore,
}

impl<'a> ZoneDirectory<'a> {
    #[must_use]
    pub const fn new(directory: &'a dyn DirectoryStore) -> Self {
        Self { directory }
    }

    /// Create a zone, optionally with an initial head.
    ///
    /// The head conflict check runs before the zone is created, so a
    /// rejected head leaves no zone behind.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::InvalidZone` for an empty name,
    /// `ZoneError::DuplicateZone` if the canonical name is taken,
    /// `ZoneError::UserNotFound` for an unknown head and
    /// `ZoneError::Conflict` if the head would duplicate another.
    #[instrument(skip(self, input), fields(zone = %input.name))]
    pub async fn create(&self, input: CreateZone) -> Result<Zone, ZoneError> {
        let name = canonical_zone_name(&input.name)?;

        if self.directory.find_zone_by_name(&name).await?.is_some() {
            return Err(ZoneError::DuplicateZone(name));
        }

        let roles = RoleService::new(self.directory);
        if let Some(head_id) = input.head_user_id {
            roles.ensure_no_other_head(head_id, &name).await?;
        }

        let new = NewZone {
            name: name.clone(),
            display_name: clean_display_name(input.display_name),
            pin_prefixes: clean_pin_prefixes(&input.pin_prefixes),
        };
        let zone = self
            .directory
            .create_zone(&new)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ZoneError::DuplicateZone(name.clone()),
                other => ZoneError::Repository(other),
            })?;
        info!(prefixes = zone.pin_prefixes.len(), "zone created");

        match input.head_user_id {
            Some(head_id) => self.install_head(&zone, head_id).await,
            None => Ok(zone),
        }
    }

    /// Edit a zone's display name, pin prefixes or head.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::ZoneNotFound` for an unknown zone, plus the head
    /// errors of [`Self::create`].
    #[instrument(skip(self, name, input), fields(zone = %name))]
    pub async fn update(&self, name: &str, input: UpdateZone) -> Result<Zone, ZoneError> {
        let canonical = canonical_zone_name(name)?;
        let existing = self
            .directory
            .find_zone_by_name(&canonical)
            .await?
            .ok_or_else(|| ZoneError::ZoneNotFound(canonical.to_string()))?;

        let patch = ZonePatch {
            display_name: input.display_name.map(|d| clean_display_name(Some(d))),
            pin_prefixes: input.pin_prefixes.as_deref().map(clean_pin_prefixes),
            head: None,
        };
        let zone = if patch == ZonePatch::default() {
            existing
        } else {
            self.directory.upsert_zone(&canonical, &patch).await?
        };

        match input.head_user_id {
            Some(head_id) if zone.head_user_id != Some(head_id) => {
                self.install_head(&zone, head_id).await
            }
            _ => Ok(zone),
        }
    }

    /// Every zone with its head name and live counts.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Repository` if a read fails.
    pub async fn list(&self) -> Result<Vec<ZoneSummary>, ZoneError> {
        let zones = self.directory.list_zones().await?;
        let ambassadors = self.directory.find_ambassadors_by_role(Role::Ca).await?;

        Ok(zones
            .into_iter()
            .map(|zone| {
                let members = ambassadors
                    .iter()
                    .filter(|a| a.zone.as_deref() == Some(zone.name.as_str()))
                    .count();
                let linked = zone.head_user_id.map_or(0, |head| {
                    ambassadors
                        .iter()
                        .filter(|a| a.zone_head_id == Some(head))
                        .count()
                });
                ZoneSummary {
                    head: zone.head_name.clone(),
                    ambassadors: members,
                    linked,
                    zone,
                }
            })
            .collect())
    }

    /// Make `head_id` the head of `zone`, link CAs by prefix or exact zone,
    /// then run the engine.
    async fn install_head(&self, zone: &Zone, head_id: UserId) -> Result<Zone, ZoneError> {
        let head = RoleService::new(self.directory)
            .install_head(head_id, &zone.name)
            .await?;

        let linked = self
            .directory
            .update_many_ambassadors(
                &AmbassadorFilter::InZoneOrPinPrefixes {
                    zone: zone.name.to_string(),
                    prefixes: zone.pin_prefixes.clone(),
                },
                &AmbassadorPatch::link(head.as_head_link()),
            )
            .await?;
        let outcome = AssignmentEngine::new(self.directory).assign(&zone.name).await?;
        info!(
            head_id = %head.id,
            linked,
            assigned = outcome.updated_count,
            "zone head installed"
        );

        self.directory
            .find_zone_by_name(&zone.name)
            .await?
            .ok_or_else(|| ZoneError::ZoneNotFound(zone.name.to_string()))
    }
}

fn clean_display_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty())
}

/// Canonical zone name for `raw`, or `InvalidZone`.
///
/// # Errors
///
/// Returns `ZoneError::InvalidZone` when `raw` normalizes to nothing.
pub fn canonical_zone_name(raw: &str) -> Result<ZoneName, ZoneError> {
    normalize_zone(raw).ok_or_else(|| ZoneError::InvalidZone(raw.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{AmbassadorLookup, NewAmbassador};
    use ca_portal_core::Email;

    async fn ca(store: &MemoryStore, email: &str, pin: Option<&str>) -> UserId {
        let mut new = NewAmbassador::new(Email::parse(email).unwrap(), "x".to_owned(), Role::Ca);
        new.pin_code = pin.map(str::to_owned);
        store.create_ambassador(&new).await.unwrap().id
    }

    #[tokio::test]
    async fn test_create_canonicalizes_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let zones = ZoneDirectory::new(&store);

        let zone = zones
            .create(CreateZone {
                name: " delhi ncr zone ".to_owned(),
                pin_prefixes: vec!["11".to_owned(), " 11 ".to_owned(), String::new()],
                ..CreateZone::default()
            })
            .await
            .unwrap();
        assert_eq!(zone.name, "DELHI NCR");
        assert_eq!(zone.pin_prefixes, vec!["11".to_owned()]);

        let err = zones
            .create(CreateZone {
                name: "Delhi NCR".to_owned(),
                ..CreateZone::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::DuplicateZone(_)));

        let err = zones
            .create(CreateZone {
                name: " - ".to_owned(),
                ..CreateZone::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::InvalidZone(_)));
    }

    #[tokio::test]
    async fn test_create_with_head_links_by_prefix() {
        let store = MemoryStore::new();
        let head = ca(&store, "head@x.io", None).await;
        let near = ca(&store, "near@x.io", Some("110017")).await;
        let far = ca(&store, "far@x.io", Some("560001")).await;

        let zone = ZoneDirectory::new(&store)
            .create(CreateZone {
                name: "Delhi NCR".to_owned(),
                pin_prefixes: vec!["11".to_owned()],
                head_user_id: Some(head),
                ..CreateZone::default()
            })
            .await
            .unwrap();

        assert_eq!(zone.head_user_id, Some(head));
        let lookup = |id| store.find_ambassador(AmbassadorLookup::Id(id));
        assert_eq!(lookup(near).await.unwrap().unwrap().zone_head_id, Some(head));
        assert_eq!(lookup(far).await.unwrap().unwrap().zone_head_id, None);
        assert_eq!(lookup(head).await.unwrap().unwrap().role, Role::ZoneHead);

        let summaries = ZoneDirectory::new(&store).list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].linked, 1);
        assert_eq!(summaries[0].head.as_deref(), Some("head@x.io"));
    }

    #[tokio::test]
    async fn test_create_with_conflicting_head_creates_nothing() {
        let store = MemoryStore::new();
        let mut legacy =
            NewAmbassador::new(Email::parse("old@x.io").unwrap(), "x".to_owned(), Role::ZoneHead);
        legacy.zone = ZoneName::parse("north");
        store.create_ambassador(&legacy).await.unwrap();
        let candidate = ca(&store, "new@x.io", None).await;

        let err = ZoneDirectory::new(&store)
            .create(CreateZone {
                name: "North Zone".to_owned(),
                head_user_id: Some(candidate),
                ..CreateZone::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ZoneError::Conflict { ref zone } if zone == "NORTH"));
        assert!(store.list_zones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_second_head() {
        let store = MemoryStore::new();
        let first = ca(&store, "a@x.io", None).await;
        let second = ca(&store, "b@x.io", None).await;
        RoleService::new(&store)
            .set_role(first, Role::ZoneHead, Some("goa"))
            .await
            .unwrap();

        let err = ZoneDirectory::new(&store)
            .update(
                "goa",
                UpdateZone {
                    head_user_id: Some(second),
                    ..UpdateZone::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ZoneError::Conflict { .. }));

        let second = store.find_ambassador(AmbassadorLookup::Id(second)).await.unwrap().unwrap();
        assert_eq!(second.role, Role::Ca);
    }

    #[tokio::test]
    async fn test_update_edits_fields() {
        let store = MemoryStore::new();
        let zones = ZoneDirectory::new(&store);
        zones
            .create(CreateZone {
                name: "south".to_owned(),
                ..CreateZone::default()
            })
            .await
            .unwrap();

        let zone = zones
            .update(
                "South Zone",
                UpdateZone {
                    display_name: Some(" Southern Region ".to_owned()),
                    pin_prefixes: Some(vec!["5".to_owned(), "6".to_owned()]),
                    head_user_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(zone.display_name.as_deref(), Some("Southern Region"));
        assert_eq!(zone.pin_prefixes.len(), 2);

        let err = zones.update("nowhere", UpdateZone::default()).await.unwrap_err();
        assert!(matches!(err, ZoneError::ZoneNotFound(_)));
    }
}
