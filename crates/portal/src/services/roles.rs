//! Role transitions.
//!
//! Promotion, zone change and demotion each touch several records: the user,
//! every CA linked to them, and the zone records. All of those writes live
//! here so route handlers never write head links themselves.
//!
//! The duplicate-head check runs before any write, so a rejected promotion
//! leaves everything untouched. The check and the writes are not atomic; two
//! concurrent promotions into the same empty zone can both pass it.

use rand::Rng;
use tracing::{info, instrument, warn};

use ca_portal_core::referral::{
    MAX_SUFFIX_ATTEMPTS, RANDOM_ALPHABET, RANDOM_CODE_LEN, referral_base, with_suffix,
};
use ca_portal_core::{
    Role, UserId, ZoneName, normalize_zone, resolve_promotion_target, zone_from_state,
};

use super::{AssignmentEngine, ZoneError};
use crate::db::DirectoryStore;
use crate::models::{
    Ambassador, AmbassadorFilter, AmbassadorLookup, AmbassadorPatch, ZoneFilter, ZonePatch,
};

/// Applies role and zone changes with their side effects.
pub struct RoleService<'a> {
    directory: &'a dyn DirectoryStore,
}

impl<'a> RoleService<'a> {
    #[must_use]
    pub const fn new(directory: &'a dyn DirectoryStore) -> Self {
        Self { directory }
    }

    fn engine(&self) -> AssignmentEngine<'a> {
        AssignmentEngine::new(self.directory)
    }

    /// Give `user_id` the role `role`, optionally in zone `zone`.
    ///
    /// Dispatches to promotion, zone change or demotion. Setting the current
    /// role again without a new zone returns the record unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::UserNotFound` for an unknown user,
    /// `ZoneError::InvalidZone` when `zone` normalizes to nothing, and
    /// `ZoneError::Conflict` when the target zone already has another head.
    #[instrument(skip(self), fields(user_id = %user_id, role = %role))]
    pub async fn set_role(
        &self,
        user_id: UserId,
        role: Role,
        zone: Option<&str>,
    ) -> Result<Ambassador, ZoneError> {
        let user = self.load(user_id).await?;
        let explicit = parse_explicit_zone(zone)?;

        match (user.role, role) {
            (Role::ZoneHead, Role::ZoneHead) => match explicit {
                Some(target) if user.headed_zone().as_ref() != Some(&target) => {
                    self.change_zone(&user, &target).await
                }
                _ => Ok(user),
            },
            (_, Role::ZoneHead) => self.promote(&user, explicit.as_ref()).await,
            (Role::ZoneHead, new_role) => self.demote(&user, new_role).await,
            (current, new_role) if current == new_role => Ok(user),
            (_, new_role) => {
                let patch = AmbassadorPatch {
                    role: Some(new_role),
                    ..AmbassadorPatch::default()
                };
                let updated = self.directory.update_ambassador(user.id, &patch).await?;
                info!("role changed");
                Ok(updated)
            }
        }
    }

    /// Move a user to another zone without changing their role.
    ///
    /// A zone head goes through the zone change path. Anyone else gets the
    /// normalized zone written; a CA is then unlinked and re-linked by the
    /// engine for their canonical zone.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_role`], plus `ZoneError::StateMismatch` when a
    /// CA's state resolves to a different zone. Nothing is written then.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_zone(&self, user_id: UserId, zone: &str) -> Result<Ambassador, ZoneError> {
        let user = self.load(user_id).await?;
        let target = normalize_zone(zone).ok_or_else(|| ZoneError::InvalidZone(zone.to_owned()))?;

        if user.role == Role::ZoneHead {
            if user.headed_zone().as_ref() == Some(&target) {
                return Ok(user);
            }
            return self.change_zone(&user, &target).await;
        }
        if user.role == Role::Ca {
            ensure_state_allows(&user, &target)?;
        }

        let mut patch = AmbassadorPatch {
            zone: Some(Some(target.to_string())),
            ..AmbassadorPatch::default()
        };
        if user.role == Role::Ca {
            patch.zone_head = Some(None);
        }
        let updated = self.directory.update_ambassador(user.id, &patch).await?;

        if updated.role == Role::Ca {
            self.engine().assign(&updated.canonical_zone()).await?;
            return self.load(user_id).await;
        }
        Ok(updated)
    }

    /// Make `user` the head of a zone.
    ///
    /// The target is `explicit`, else the user's zone, pin code prefix or
    /// state, else `INTERNATIONAL`.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Conflict` if another head leads the target zone.
    #[instrument(skip(self, user, explicit), fields(user_id = %user.id))]
    pub async fn promote(
        &self,
        user: &Ambassador,
        explicit: Option<&ZoneName>,
    ) -> Result<Ambassador, ZoneError> {
        let target = resolve_promotion_target(
            explicit.map(ZoneName::as_str),
            user.zone.as_deref(),
            user.pin_code.as_deref(),
            user.state.as_deref(),
        )
        .zone_or_international();

        self.ensure_no_other_head(user.id, &target).await?;

        let referral_code = match user.referral_code {
            Some(_) => None,
            None => Some(self.generate_referral_code(user).await?),
        };

        let patch = AmbassadorPatch {
            role: Some(Role::ZoneHead),
            zone: Some(Some(target.to_string())),
            zone_head: Some(None),
            referral_code,
            ..AmbassadorPatch::default()
        };
        let promoted = self.directory.update_ambassador(user.id, &patch).await?;

        self.claim_zone_record(&promoted, &target).await?;
        let outcome = self.engine().assign(&target).await?;

        info!(zone = %target, linked = outcome.updated_count, "promoted to zone head");
        Ok(promoted)
    }

    /// Move an existing head to `target`.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Conflict` if another head leads `target`.
    #[instrument(skip(self, head, target), fields(user_id = %head.id, zone = %target))]
    pub async fn change_zone(
        &self,
        head: &Ambassador,
        target: &ZoneName,
    ) -> Result<Ambassador, ZoneError> {
        self.ensure_no_other_head(head.id, target).await?;

        let patch = AmbassadorPatch {
            zone: Some(Some(target.to_string())),
            ..AmbassadorPatch::default()
        };
        let moved = self.directory.update_ambassador(head.id, &patch).await?;

        self.claim_zone_record(&moved, target).await?;

        let pin_prefix = target.prefix(3).to_owned();
        let linked = self
            .directory
            .update_many_ambassadors(
                &AmbassadorFilter::MatchingZone {
                    zone: target.to_string(),
                    pin_prefix: pin_prefix.clone(),
                },
                &AmbassadorPatch::link(moved.as_head_link()),
            )
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to link ambassadors by zone and pin");
                0
            });

        let outcome = self.engine().assign(target).await?;

        let unlinked = self
            .directory
            .update_many_ambassadors(
                &AmbassadorFilter::LinkedOutside {
                    head: moved.id,
                    zone: target.to_string(),
                    pin_prefix,
                },
                &AmbassadorPatch::unlink(),
            )
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to unlink ambassadors outside the new zone");
                0
            });

        info!(
            linked,
            assigned = outcome.updated_count,
            unlinked,
            "zone head moved"
        );
        Ok(moved)
    }

    /// Take the head role away from `head`.
    ///
    /// Every CA linked to them is unlinked and every zone record pointing at
    /// them is cleared before the new role is written.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Repository` if a write fails.
    #[instrument(skip(self, head), fields(user_id = %head.id, role = %role))]
    pub async fn demote(&self, head: &Ambassador, role: Role) -> Result<Ambassador, ZoneError> {
        let unlinked = self
            .directory
            .update_many_ambassadors(&AmbassadorFilter::LinkedTo(head.id), &AmbassadorPatch::unlink())
            .await?;
        let zones = self
            .directory
            .update_many_zones(&ZoneFilter::HeadedBy(head.id), &ZonePatch::clear_head())
            .await?;

        let patch = AmbassadorPatch {
            role: Some(role),
            ..AmbassadorPatch::default()
        };
        let demoted = self.directory.update_ambassador(head.id, &patch).await?;

        info!(unlinked, zones, "zone head demoted");
        Ok(demoted)
    }

    /// Make `user_id` the head of `zone`, whatever their current role.
    ///
    /// A user who already heads `zone` only has the zone record re-pointed at
    /// them; another head is moved; anyone else is promoted.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Conflict` if another head leads `zone`.
    pub async fn install_head(&self, user_id: UserId, zone: &ZoneName) -> Result<Ambassador, ZoneError> {
        let user = self.load(user_id).await?;
        match user.role {
            Role::ZoneHead if user.headed_zone().as_ref() == Some(zone) => {
                self.ensure_no_other_head(user.id, zone).await?;
                self.claim_zone_record(&user, zone).await?;
                Ok(user)
            }
            Role::ZoneHead => self.change_zone(&user, zone).await,
            _ => self.promote(&user, Some(zone)).await,
        }
    }

    /// Fail with `Conflict` if a head other than `user_id` leads `target`.
    ///
    /// A head counts when either their normalized zone field or their headed
    /// zone (zone field, then state) equals the target.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Conflict` naming the zone.
    pub async fn ensure_no_other_head(
        &self,
        user_id: UserId,
        target: &ZoneName,
    ) -> Result<(), ZoneError> {
        let heads = self.directory.find_ambassadors_by_role(Role::ZoneHead).await?;
        let taken = heads.iter().filter(|h| h.id != user_id).any(|h| {
            h.zone.as_deref().and_then(normalize_zone).as_ref() == Some(target)
                || h.headed_zone().as_ref() == Some(target)
        });

        if taken {
            warn!(zone = %target, "zone already has a head");
            return Err(ZoneError::Conflict {
                zone: target.clone(),
            });
        }
        Ok(())
    }

    /// Point the zone record at `head` and clear every other record that
    /// still points at them.
    async fn claim_zone_record(&self, head: &Ambassador, zone: &ZoneName) -> Result<(), ZoneError> {
        self.directory
            .upsert_zone(zone, &ZonePatch::set_head(head.as_head_link()))
            .await?;
        self.directory
            .update_many_zones(
                &ZoneFilter::HeadedByExcept {
                    head: head.id,
                    keep: zone.clone(),
                },
                &ZonePatch::clear_head(),
            )
            .await?;
        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Ambassador, ZoneError> {
        self.directory
            .find_ambassador(AmbassadorLookup::Id(user_id))
            .await?
            .ok_or(ZoneError::UserNotFound)
    }

    /// First free referral code for `user`.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Repository` if the uniqueness check fails.
    pub async fn generate_referral_code(&self, user: &Ambassador) -> Result<String, ZoneError> {
        let Some(base) = referral_base(&user.email, user.phone.as_deref()) else {
            return Ok(random_code());
        };

        if !self.code_taken(&base).await? {
            return Ok(base);
        }
        for n in 1..=MAX_SUFFIX_ATTEMPTS {
            let candidate = with_suffix(&base, n);
            if !self.code_taken(&candidate).await? {
                return Ok(candidate);
            }
        }

        warn!(base = %base, "referral code space exhausted, using a random code");
        Ok(random_code())
    }

    async fn code_taken(&self, code: &str) -> Result<bool, ZoneError> {
        Ok(self
            .directory
            .find_ambassador(AmbassadorLookup::ReferralCode(code))
            .await?
            .is_some())
    }
}

/// A CA's zone is derived from their state when it is known, so only the
/// state's own region can be stored for them.
///
/// # Errors
///
/// Returns `ZoneError::StateMismatch` when the state resolves elsewhere.
pub fn ensure_state_allows(user: &Ambassador, target: &ZoneName) -> Result<(), ZoneError> {
    match user.state.as_deref().and_then(zone_from_state) {
        Some(region) if region.as_str() != target.as_str() => Err(ZoneError::StateMismatch {
            requested: target.clone(),
            resolved: region.into(),
        }),
        _ => Ok(()),
    }
}

/// `None` for a missing or blank zone, `InvalidZone` for junk.
fn parse_explicit_zone(zone: Option<&str>) -> Result<Option<ZoneName>, ZoneError> {
    match zone.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => normalize_zone(raw)
            .map(Some)
            .ok_or_else(|| ZoneError::InvalidZone(raw.to_owned())),
    }
}

fn random_code() -> String {
    let mut rng = rand::rng();
    (0..RANDOM_CODE_LEN)
        .map(|_| char::from(RANDOM_ALPHABET[rng.random_range(0..RANDOM_ALPHABET.len())]))
        .collect()
}
