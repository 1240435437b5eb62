//! Zone assignment flows over the in-memory store.
//!
//! Each test builds its own store, so they run in parallel.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use ca_portal::db::{DirectoryStore, MemoryStore};
use ca_portal::models::AmbassadorPatch;
use ca_portal::services::{AssignmentEngine, CreateZone, RoleService, ZoneDirectory, ZoneError};
use ca_portal_core::{Role, UserId, ZoneName};
use ca_portal_integration_tests::{Profile, reload, seed, zone};

const fn in_state<'a>(name: &'a str, state: &'a str) -> Profile<'a> {
    Profile {
        name: Some(name),
        state: Some(state),
        pin_code: None,
        zone: None,
    }
}

type Link = (UserId, Option<String>, Option<UserId>, Option<String>);

async fn links(store: &MemoryStore) -> Vec<Link> {
    store
        .find_ambassadors_by_role(Role::Ca)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.id, a.zone, a.zone_head_id, a.zone_head_name))
        .collect()
}

/// At most one head per canonical zone, and every link points at a current
/// head who leads the CA's zone or whose zone record covers the CA's pin.
async fn assert_consistent(store: &MemoryStore) {
    let heads = store.find_ambassadors_by_role(Role::ZoneHead).await.unwrap();
    let mut per_zone: BTreeMap<ZoneName, Vec<UserId>> = BTreeMap::new();
    for head in &heads {
        if let Some(zone) = head.headed_zone() {
            per_zone.entry(zone).or_default().push(head.id);
        }
    }
    for (zone, ids) in &per_zone {
        assert!(ids.len() <= 1, "zone {zone} has heads {ids:?}");
    }

    let zones = store.list_zones().await.unwrap();

    for ca in store.find_ambassadors_by_role(Role::Ca).await.unwrap() {
        let Some(head_id) = ca.zone_head_id else {
            continue;
        };
        let head = heads.iter().find(|h| h.id == head_id);
        assert!(head.is_some(), "CA {} linked to non-head {head_id}", ca.id);

        let leads_zone = head.and_then(|h| h.headed_zone()) == Some(ca.canonical_zone());
        let covers_pin = ca.pin_code.as_deref().is_some_and(|pin| {
            zones
                .iter()
                .any(|z| z.head_user_id == Some(head_id) && z.matches_pin(pin))
        });
        assert!(
            leads_zone || covers_pin,
            "CA {} in {} linked to head {head_id} of another zone",
            ca.id,
            ca.canonical_zone()
        );
    }
}

#[tokio::test]
async fn test_promote_into_empty_zone_links_neighbours() {
    let store = MemoryStore::new();
    let priya = seed(&store, "priya@college.edu", Role::Ca, in_state("Priya", "Punjab")).await;
    let harsh = seed(&store, "harsh@college.edu", Role::Ca, in_state("Harsh", "Haryana")).await;

    let promoted = RoleService::new(&store)
        .set_role(priya.id, Role::ZoneHead, None)
        .await
        .unwrap();

    assert_eq!(promoted.role, Role::ZoneHead);
    assert_eq!(promoted.zone.as_deref(), Some("NORTH"));
    assert_eq!(promoted.referral_code.as_deref(), Some("PRIYA"));

    let harsh = reload(&store, harsh.id).await;
    assert_eq!(harsh.zone_head_id, Some(priya.id));
    assert_eq!(harsh.zone_head_name.as_deref(), Some("Priya"));
    assert_eq!(harsh.zone.as_deref(), Some("NORTH"));

    let record = store.find_zone_by_name(&zone("NORTH")).await.unwrap().unwrap();
    assert_eq!(record.head_user_id, Some(priya.id));
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_duplicate_promotion_rejected_without_writes() {
    let store = MemoryStore::new();
    let priya = seed(&store, "priya@college.edu", Role::Ca, in_state("Priya", "Punjab")).await;
    let dev = seed(&store, "dev@college.edu", Role::Ca, in_state("Dev", "Delhi")).await;
    let roles = RoleService::new(&store);
    roles.set_role(priya.id, Role::ZoneHead, None).await.unwrap();

    let err = roles.set_role(dev.id, Role::ZoneHead, None).await.unwrap_err();
    assert!(matches!(&err, ZoneError::Conflict { zone } if *zone == "NORTH"));
    assert_eq!(err.to_string(), "zone already has a head: NORTH");

    let dev = reload(&store, dev.id).await;
    assert_eq!(dev.role, Role::Ca);
    assert_eq!(dev.referral_code, None);
    assert_eq!(dev.zone_head_id, Some(priya.id));
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_backfill_after_manual_state_edit() {
    let store = MemoryStore::new();
    let roles = RoleService::new(&store);
    let north = seed(&store, "n@college.edu", Role::Ca, in_state("North Head", "Punjab")).await;
    let south = seed(&store, "s@college.edu", Role::Ca, in_state("South Head", "Tamil Nadu")).await;
    roles.set_role(north.id, Role::ZoneHead, None).await.unwrap();
    let south = roles.set_role(south.id, Role::ZoneHead, None).await.unwrap();
    assert_eq!(south.zone.as_deref(), Some("SOUTH"));

    // Someone edited the state to Kerala without reconciling, so the record
    // still says NORTH and points at the NORTH head.
    let kiran = seed(
        &store,
        "kiran@college.edu",
        Role::Ca,
        Profile {
            zone: Some("NORTH"),
            ..in_state("Kiran", "Kerala")
        },
    )
    .await;
    let north = reload(&store, north.id).await;
    store
        .update_ambassador(kiran.id, &AmbassadorPatch::link(north.as_head_link()))
        .await
        .unwrap();

    let outcome = AssignmentEngine::new(&store).backfill_all().await.unwrap();
    assert_eq!(outcome.zones, vec![zone("SOUTH")]);
    assert_eq!(outcome.updated_count, 1);

    let kiran = reload(&store, kiran.id).await;
    assert_eq!(kiran.zone.as_deref(), Some("SOUTH"));
    assert_eq!(kiran.zone_head_id, Some(south.id));
    assert_eq!(kiran.zone_head_name.as_deref(), Some("South Head"));
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_backfill_into_headless_zone_drops_old_head() {
    let store = MemoryStore::new();
    let north = seed(&store, "n@college.edu", Role::Ca, in_state("North Head", "Punjab")).await;
    let north = RoleService::new(&store)
        .set_role(north.id, Role::ZoneHead, None)
        .await
        .unwrap();

    // Moved to Kerala by a manual edit, while SOUTH has nobody in charge.
    let kiran = seed(
        &store,
        "kiran@college.edu",
        Role::Ca,
        Profile {
            zone: Some("NORTH"),
            ..in_state("Kiran", "Kerala")
        },
    )
    .await;
    store
        .update_ambassador(kiran.id, &AmbassadorPatch::link(north.as_head_link()))
        .await
        .unwrap();

    let engine = AssignmentEngine::new(&store);
    let first = engine.backfill_all().await.unwrap();
    let after_first = links(&store).await;
    let second = engine.backfill_all().await.unwrap();

    assert_eq!(first.zones, vec![zone("SOUTH")]);
    assert_eq!(first, second);
    assert_eq!(after_first, links(&store).await);

    let kiran = reload(&store, kiran.id).await;
    assert_eq!(kiran.zone.as_deref(), Some("SOUTH"));
    assert_eq!(kiran.zone_head_id, None);
    assert_eq!(kiran.zone_head_name, None);
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_assignment_is_idempotent() {
    let store = MemoryStore::new();
    let head = seed(&store, "h@college.edu", Role::Ca, in_state("Head", "Goa")).await;
    for i in 0..4 {
        seed(&store, &format!("ca{i}@college.edu"), Role::Ca, in_state("CA", "Maharashtra")).await;
    }
    RoleService::new(&store)
        .set_role(head.id, Role::ZoneHead, None)
        .await
        .unwrap();

    let engine = AssignmentEngine::new(&store);
    let first = engine.assign_zone_head_to_zone("western zone").await.unwrap();
    let after_first = links(&store).await;
    let second = engine.assign_zone_head_to_zone("WEST").await.unwrap();
    let after_second = links(&store).await;

    assert_eq!(first.updated_count, 4);
    assert_eq!(second.updated_count, 4);
    assert_eq!(first.zone_head_id, Some(head.id));
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_unknown_zone_is_a_no_op() {
    let store = MemoryStore::new();
    let outcome = AssignmentEngine::new(&store)
        .assign_zone_head_to_zone("  zone ")
        .await
        .unwrap();
    assert_eq!(outcome.updated_count, 0);
    assert_eq!(outcome.zone_head_id, None);
}

#[tokio::test]
async fn test_uniqueness_survives_role_sequences() {
    let store = MemoryStore::new();
    let roles = RoleService::new(&store);
    let a = seed(&store, "a@college.edu", Role::Ca, in_state("A", "Punjab")).await;
    let b = seed(&store, "b@college.edu", Role::Ca, in_state("B", "Delhi")).await;
    let c = seed(&store, "c@college.edu", Role::Ca, in_state("C", "Kerala")).await;
    for i in 0..3 {
        seed(&store, &format!("n{i}@college.edu"), Role::Ca, in_state("N", "Haryana")).await;
        seed(&store, &format!("s{i}@college.edu"), Role::Ca, in_state("S", "Karnataka")).await;
    }

    roles.set_role(a.id, Role::ZoneHead, None).await.unwrap();
    assert_consistent(&store).await;

    assert!(roles.set_role(b.id, Role::ZoneHead, None).await.is_err());
    assert_consistent(&store).await;

    roles
        .set_role(a.id, Role::ZoneHead, Some("south zone"))
        .await
        .unwrap();
    assert_consistent(&store).await;

    roles.set_role(b.id, Role::ZoneHead, None).await.unwrap();
    assert_consistent(&store).await;

    assert!(roles.set_role(c.id, Role::ZoneHead, None).await.is_err());
    assert!(
        roles
            .set_role(b.id, Role::ZoneHead, Some("SOUTH"))
            .await
            .is_err()
    );
    assert_consistent(&store).await;

    roles.set_role(a.id, Role::Ca, None).await.unwrap();
    assert_consistent(&store).await;

    let c = roles.set_role(c.id, Role::ZoneHead, None).await.unwrap();
    assert_eq!(c.zone.as_deref(), Some("SOUTH"));
    assert_consistent(&store).await;

    // Every Karnataka CA now follows C, every Haryana CA follows B.
    for ca in store.find_ambassadors_by_role(Role::Ca).await.unwrap() {
        match ca.state.as_deref() {
            Some("Karnataka") => assert_eq!(ca.zone_head_id, Some(c.id)),
            Some("Haryana") => assert_eq!(ca.zone_head_id, Some(b.id)),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_demotion_clears_links_and_zone_record() {
    let store = MemoryStore::new();
    let roles = RoleService::new(&store);
    let head = seed(&store, "h@college.edu", Role::Ca, in_state("Head", "Bihar")).await;
    let ca = seed(&store, "c@college.edu", Role::Ca, in_state("CA", "Assam")).await;
    roles.set_role(head.id, Role::ZoneHead, None).await.unwrap();
    assert_eq!(reload(&store, ca.id).await.zone_head_id, Some(head.id));

    let demoted = roles.set_role(head.id, Role::Ca, None).await.unwrap();
    assert_eq!(demoted.role, Role::Ca);

    let ca = reload(&store, ca.id).await;
    assert_eq!(ca.zone_head_id, None);
    assert_eq!(ca.zone_head_name, None);

    let record = store.find_zone_by_name(&zone("EAST")).await.unwrap().unwrap();
    assert_eq!(record.head_user_id, None);
    assert_eq!(record.head_name, None);
}

#[tokio::test]
async fn test_zone_with_pin_prefixes_links_on_create() {
    let store = MemoryStore::new();
    let head = seed(&store, "h@college.edu", Role::Ca, in_state("Central Head", "Chhattisgarh")).await;
    let by_pin = seed(
        &store,
        "p@college.edu",
        Role::Ca,
        Profile {
            pin_code: Some("462001"),
            ..Profile::default()
        },
    )
    .await;
    let elsewhere = seed(
        &store,
        "e@college.edu",
        Role::Ca,
        Profile {
            pin_code: Some("567890"),
            ..Profile::default()
        },
    )
    .await;

    let directory = ZoneDirectory::new(&store);
    let created = directory
        .create(CreateZone {
            name: "central zone".to_owned(),
            display_name: Some("Central India".to_owned()),
            pin_prefixes: vec!["46".to_owned(), "45".to_owned()],
            head_user_id: Some(head.id),
        })
        .await
        .unwrap();

    assert_eq!(created.name, "CENTRAL");
    assert_eq!(created.head_user_id, Some(head.id));
    assert_eq!(reload(&store, by_pin.id).await.zone_head_id, Some(head.id));
    assert_eq!(reload(&store, elsewhere.id).await.zone_head_id, None);

    let summaries = directory.list().await.unwrap();
    let central = summaries.iter().find(|s| s.zone.name == "CENTRAL").unwrap();
    assert_eq!(central.head.as_deref(), Some("Central Head"));
    assert_eq!(central.linked, 1);
}

/// Promotion checks and writes in separate steps with no lock in between.
/// Two admins who both pass the check before either writes end up with two
/// heads; the zone record still names exactly one, and the next promotion
/// into the zone is refused.
#[tokio::test]
async fn test_check_then_write_race_is_observable() {
    let store = MemoryStore::new();
    let roles = RoleService::new(&store);
    let a = seed(&store, "a@college.edu", Role::Ca, in_state("A", "Punjab")).await;
    let b = seed(&store, "b@college.edu", Role::Ca, in_state("B", "Delhi")).await;
    let c = seed(&store, "c@college.edu", Role::Ca, in_state("C", "Haryana")).await;
    let north = zone("NORTH");

    // Both checks pass because neither write has happened yet.
    roles.ensure_no_other_head(a.id, &north).await.unwrap();
    roles.ensure_no_other_head(b.id, &north).await.unwrap();

    roles.install_head(a.id, &north).await.unwrap();
    // The second admin's write, bypassing the check it already passed.
    store
        .update_ambassador(
            b.id,
            &AmbassadorPatch {
                role: Some(Role::ZoneHead),
                zone: Some(Some("NORTH".to_owned())),
                ..AmbassadorPatch::default()
            },
        )
        .await
        .unwrap();

    let heads = store.find_ambassadors_by_role(Role::ZoneHead).await.unwrap();
    assert_eq!(
        heads
            .iter()
            .filter(|h| h.headed_zone().as_ref() == Some(&north))
            .count(),
        2
    );

    // The engine follows the zone record, so links stay deterministic.
    AssignmentEngine::new(&store).assign(&north).await.unwrap();
    let record = store.find_zone_by_name(&north).await.unwrap().unwrap();
    assert_eq!(record.head_user_id, Some(a.id));
    assert_eq!(reload(&store, c.id).await.zone_head_id, Some(a.id));

    assert!(matches!(
        roles.set_role(c.id, Role::ZoneHead, None).await,
        Err(ZoneError::Conflict { .. })
    ));
}
