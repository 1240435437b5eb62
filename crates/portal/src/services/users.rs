//! Admin edits of user records.

use tracing::{info, instrument};

use ca_portal_core::{Role, UserId, normalize_zone};

use super::roles::ensure_state_allows;
use super::{RoleService, ZoneError};
use crate::db::{DirectoryStore, RepositoryError};
use crate::models::{Ambassador, AmbassadorLookup, AmbassadorPatch};

/// Admin edit of one user. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub zone: Option<String>,
    pub points: Option<i32>,
    pub tasks_done: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserUpdateError {
    #[error("{0} must not be negative")]
    Negative(&'static str),

    #[error(transparent)]
    Zone(#[from] ZoneError),
}

impl From<RepositoryError> for UserUpdateError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::Zone(ZoneError::UserNotFound),
            other => Self::Zone(ZoneError::Repository(other)),
        }
    }
}

/// Apply an admin edit.
///
/// Role and zone changes go through [`RoleService`] so head links stay
/// consistent; metrics are written directly.
///
/// # Errors
///
/// Returns `UserUpdateError::Negative` for negative metrics (before any
/// write) and the role service errors otherwise.
#[instrument(skip(directory, update), fields(user_id = %id))]
pub async fn update_user(
    directory: &dyn DirectoryStore,
    id: UserId,
    update: UserUpdate,
) -> Result<Ambassador, UserUpdateError> {
    if update.points.is_some_and(|p| p < 0) {
        return Err(UserUpdateError::Negative("points"));
    }
    if update.tasks_done.is_some_and(|t| t < 0) {
        return Err(UserUpdateError::Negative("tasksDone"));
    }

    let roles = RoleService::new(directory);
    let zone = update.zone.as_deref().map(str::trim).filter(|z| !z.is_empty());

    // A CA's state pins their zone; refuse a contradicting edit up front so a
    // role change in the same request is not half applied.
    if let Some(target) = zone.and_then(normalize_zone) {
        let current = directory
            .find_ambassador(AmbassadorLookup::Id(id))
            .await?
            .ok_or(ZoneError::UserNotFound)?;
        if update.role.unwrap_or(current.role) == Role::Ca {
            ensure_state_allows(&current, &target)?;
        }
    }

    let mut user = match (update.role, zone) {
        (Some(role), zone) => roles.set_role(id, role, zone).await?,
        (None, Some(zone)) => roles.set_zone(id, zone).await?,
        (None, None) => directory
            .find_ambassador(AmbassadorLookup::Id(id))
            .await?
            .ok_or(ZoneError::UserNotFound)?,
    };

    // A role change with a zone only moves heads; everyone else still needs
    // the zone applied.
    if let (Some(role), Some(zone)) = (update.role, zone)
        && role != Role::ZoneHead
    {
        user = roles.set_zone(id, zone).await?;
    }

    if update.points.is_some() || update.tasks_done.is_some() {
        let patch = AmbassadorPatch {
            points: update.points,
            tasks_done: update.tasks_done,
            ..AmbassadorPatch::default()
        };
        user = directory.update_ambassador(id, &patch).await?;
    }

    info!(role = %user.role, "user updated");
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewAmbassador;
    use ca_portal_core::Email;

    #[tokio::test]
    async fn test_metrics_and_zone() {
        let store = MemoryStore::new();
        let ca = store
            .create_ambassador(&NewAmbassador::new(
                Email::parse("c@x.io").unwrap(),
                "x".to_owned(),
                Role::Ca,
            ))
            .await
            .unwrap();

        let updated = update_user(
            &store,
            ca.id,
            UserUpdate {
                zone: Some("west zone".to_owned()),
                points: Some(12),
                tasks_done: Some(2),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.zone.as_deref(), Some("WEST"));
        assert_eq!(updated.points, 12);
        assert_eq!(updated.tasks_done, 2);
    }

    #[tokio::test]
    async fn test_zone_contradicting_state_rejected() {
        let store = MemoryStore::new();
        let mut new = NewAmbassador::new(Email::parse("p@x.io").unwrap(), "x".to_owned(), Role::Ca);
        new.state = Some("Punjab".to_owned());
        let ca = store.create_ambassador(&new).await.unwrap();

        let err = update_user(
            &store,
            ca.id,
            UserUpdate {
                zone: Some("SOUTH".to_owned()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            &err,
            UserUpdateError::Zone(ZoneError::StateMismatch { requested, resolved })
                if *requested == "SOUTH" && *resolved == "NORTH"
        ));
        assert_eq!(err.to_string(), "state places the user in NORTH, not SOUTH");

        let unchanged = store
            .find_ambassador(AmbassadorLookup::Id(ca.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.zone, None);

        // The state's own region is accepted.
        let updated = update_user(
            &store,
            ca.id,
            UserUpdate {
                zone: Some("north zone".to_owned()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.zone.as_deref(), Some("NORTH"));
    }

    #[tokio::test]
    async fn test_admin_demoted_to_ca_checks_state_first() {
        let store = MemoryStore::new();
        let mut new = NewAmbassador::new(Email::parse("a@x.io").unwrap(), "x".to_owned(), Role::Admin);
        new.state = Some("Kerala".to_owned());
        let admin = store.create_ambassador(&new).await.unwrap();

        let err = update_user(
            &store,
            admin.id,
            UserUpdate {
                role: Some(Role::Ca),
                zone: Some("EAST".to_owned()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserUpdateError::Zone(ZoneError::StateMismatch { .. })));

        let unchanged = store
            .find_ambassador(AmbassadorLookup::Id(admin.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_negative_rejected_before_writes() {
        let store = MemoryStore::new();
        let ca = store
            .create_ambassador(&NewAmbassador::new(
                Email::parse("c@x.io").unwrap(),
                "x".to_owned(),
                Role::Ca,
            ))
            .await
            .unwrap();

        let err = update_user(
            &store,
            ca.id,
            UserUpdate {
                role: Some(Role::ZoneHead),
                points: Some(-1),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserUpdateError::Negative("points")));

        let unchanged = store
            .find_ambassador(AmbassadorLookup::Id(ca.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.role, Role::Ca);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = MemoryStore::new();
        let err = update_user(&store, UserId::new(7), UserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UserUpdateError::Zone(ZoneError::UserNotFound)));
    }
}
