//! Read-only views: leaderboard, profile, zone head and admin dashboards.

use serde::Serialize;

use ca_portal_core::{AssignmentStatus, Region, Role, SubmissionStatus, UserId, ZoneName};

use crate::db::{DirectoryStore, ProgramStore, RepositoryError};
use crate::models::{Ambassador, AmbassadorLookup, AssignmentScope, SubmissionScope};

/// Rows on the public leaderboard.
pub const LEADERBOARD_SIZE: usize = 50;

/// Members listed in a zone head's stats.
pub const TOP_MEMBERS: usize = 10;

/// Campus ambassador seats per regional zone.
pub const MAX_CA_PER_ZONE: usize = 50;

/// Campus ambassador seats across the programme.
pub const MAX_CA_TOTAL: usize = 200;

/// Zone heads listed as recent on the admin overview.
pub const RECENT_HEADS: usize = 5;

const OVERVIEW_ZONES: [Region; 4] = [Region::East, Region::West, Region::North, Region::South];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: UserId,
    pub name: String,
    pub college: Option<String>,
    pub zone: Option<String>,
    pub points: i32,
    pub tasks_done: i32,
}

impl LeaderboardEntry {
    fn new(rank: usize, user: &Ambassador) -> Self {
        Self {
            rank,
            id: user.id,
            name: user.display_name().to_owned(),
            college: user.college.clone(),
            zone: user.zone.clone(),
            points: user.points,
            tasks_done: user.tasks_done,
        }
    }
}

/// Contact card of an ambassador's zone head.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadBrief {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub zone: Option<String>,
}

impl From<&Ambassador> for HeadBrief {
    fn from(head: &Ambassador) -> Self {
        Self {
            id: head.id,
            name: head.display_name().to_owned(),
            email: head.email.to_string(),
            phone: head.phone.clone(),
            zone: head.zone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: Ambassador,
    pub zone_head: Option<HeadBrief>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStats {
    pub zone: Option<String>,
    pub active_ambassadors: usize,
    pub pending_reviews: usize,
    pub top_members: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub zone_heads: usize,
    pub campus_ambassadors: usize,
    pub pending_reviews: usize,
    pub open_assignments: usize,
    /// Seats left under [`MAX_CA_TOTAL`], never negative.
    pub remaining_slots: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverview {
    pub zone: ZoneName,
    pub head: Option<HeadBrief>,
    pub ca_count: usize,
    pub ca_limit: usize,
    pub ca_points_total: i64,
    pub ca_tasks_done: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub totals: OverviewTotals,
    pub zone_stats: Vec<ZoneOverview>,
    pub recent_zone_heads: Vec<HeadBrief>,
}

/// Non-admin users ranked by points, ties broken by id.
fn ranked<'u>(users: impl Iterator<Item = &'u Ambassador>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut users: Vec<&Ambassador> = users.filter(|u| u.role != Role::Admin).collect();
    users.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.as_i32().cmp(&b.id.as_i32())));
    users
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, u)| LeaderboardEntry::new(i + 1, u))
        .collect()
}

/// Top [`LEADERBOARD_SIZE`] non-admin users.
///
/// # Errors
///
/// Returns `RepositoryError` if the users cannot be listed.
pub async fn leaderboard(
    directory: &dyn DirectoryStore,
) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
    let users = directory.list_ambassadors().await?;
    Ok(ranked(users.iter(), LEADERBOARD_SIZE))
}

/// `user` plus their zone head, if they are linked to one.
///
/// # Errors
///
/// Returns `RepositoryError` if the head lookup fails.
pub async fn profile(
    directory: &dyn DirectoryStore,
    user: Ambassador,
) -> Result<Profile, RepositoryError> {
    let zone_head = match user.zone_head_id {
        Some(head_id) => directory
            .find_ambassador(AmbassadorLookup::Id(head_id))
            .await?
            .as_ref()
            .map(HeadBrief::from),
        None => None,
    };
    Ok(Profile { user, zone_head })
}

/// CAs linked to `head`, best first.
///
/// # Errors
///
/// Returns `RepositoryError` if the ambassadors cannot be listed.
pub async fn zone_ambassadors(
    directory: &dyn DirectoryStore,
    head: &Ambassador,
) -> Result<Vec<Ambassador>, RepositoryError> {
    let mut linked: Vec<Ambassador> = directory
        .find_ambassadors_by_role(Role::Ca)
        .await?
        .into_iter()
        .filter(|a| a.zone_head_id == Some(head.id))
        .collect();
    linked.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.as_i32().cmp(&b.id.as_i32())));
    Ok(linked)
}

/// Dashboard numbers for the zone `head` leads.
///
/// # Errors
///
/// Returns `RepositoryError` if a read fails.
pub async fn zone_stats(
    directory: &dyn DirectoryStore,
    program: &dyn ProgramStore,
    head: &Ambassador,
) -> Result<ZoneStats, RepositoryError> {
    let Some(zone) = head.headed_zone() else {
        return Ok(ZoneStats {
            zone: None,
            active_ambassadors: 0,
            pending_reviews: 0,
            top_members: Vec::new(),
        });
    };

    let members: Vec<Ambassador> = directory
        .find_ambassadors_by_role(Role::Ca)
        .await?
        .into_iter()
        .filter(|a| a.zone.as_deref() == Some(zone.as_str()))
        .collect();

    let pending_reviews = program
        .list_submissions(&SubmissionScope::Zone(zone.to_string()))
        .await?
        .iter()
        .filter(|s| s.status == SubmissionStatus::Pending)
        .count();

    Ok(ZoneStats {
        zone: Some(zone.to_string()),
        active_ambassadors: members.len(),
        pending_reviews,
        top_members: ranked(members.iter(), TOP_MEMBERS),
    })
}

/// Programme-wide numbers for the admin dashboard.
///
/// CAs are counted in the zone they resolve to. A regional zone's head is
/// the oldest zone head leading it.
///
/// # Errors
///
/// Returns `RepositoryError` if a read fails.
pub async fn admin_overview(
    directory: &dyn DirectoryStore,
    program: &dyn ProgramStore,
) -> Result<AdminOverview, RepositoryError> {
    let heads = directory.find_ambassadors_by_role(Role::ZoneHead).await?;
    let cas = directory.find_ambassadors_by_role(Role::Ca).await?;

    let pending_reviews = program
        .list_submissions(&SubmissionScope::All)
        .await?
        .iter()
        .filter(|s| s.status == SubmissionStatus::Pending)
        .count();
    let open_assignments = program
        .list_assignments(&AssignmentScope::All)
        .await?
        .iter()
        .filter(|a| a.status == AssignmentStatus::Pending)
        .count();

    let zone_stats = OVERVIEW_ZONES
        .into_iter()
        .map(|region| {
            let zone = ZoneName::from(region);
            let members: Vec<&Ambassador> =
                cas.iter().filter(|a| a.canonical_zone() == zone).collect();
            ZoneOverview {
                head: heads
                    .iter()
                    .find(|h| h.headed_zone().as_ref() == Some(&zone))
                    .map(HeadBrief::from),
                ca_count: members.len(),
                ca_limit: MAX_CA_PER_ZONE,
                ca_points_total: members.iter().map(|a| i64::from(a.points)).sum(),
                ca_tasks_done: members.iter().map(|a| i64::from(a.tasks_done)).sum(),
                zone,
            }
        })
        .collect();

    let mut recent: Vec<&Ambassador> = heads.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    Ok(AdminOverview {
        totals: OverviewTotals {
            zone_heads: heads.len(),
            campus_ambassadors: cas.len(),
            pending_reviews,
            open_assignments,
            remaining_slots: MAX_CA_TOTAL.saturating_sub(cas.len()),
        },
        zone_stats,
        recent_zone_heads: recent
            .into_iter()
            .take(RECENT_HEADS)
            .map(HeadBrief::from)
            .collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ambassador::tests::ambassador;

    #[test]
    fn test_ranking_excludes_admins_and_breaks_ties_by_id() {
        let mut a = ambassador(3, Role::Ca);
        a.points = 10;
        let mut b = ambassador(2, Role::ZoneHead);
        b.points = 10;
        let mut c = ambassador(1, Role::Admin);
        c.points = 99;
        let mut d = ambassador(4, Role::Ca);
        d.points = 30;

        let board = ranked([a, b, c, d].iter(), 50);
        let ids: Vec<i32> = board.iter().map(|e| e.id.as_i32()).collect();
        assert_eq!(ids, vec![4, 2, 3]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
    }

    #[tokio::test]
    async fn test_admin_overview() {
        use crate::db::MemoryStore;
        use crate::models::NewAmbassador;
        use ca_portal_core::Email;

        async fn add(
            store: &MemoryStore,
            email: &str,
            role: Role,
            state: Option<&str>,
            zone: Option<&str>,
        ) {
            let mut new = NewAmbassador::new(Email::parse(email).unwrap(), "x".to_owned(), role);
            new.state = state.map(str::to_owned);
            new.zone = zone.and_then(ZoneName::parse);
            let created = store.create_ambassador(&new).await.unwrap();
            if role == Role::Ca {
                store.award_points(created.id, 10).await.unwrap();
            }
        }

        let store = MemoryStore::new();
        add(&store, "north@x.io", Role::ZoneHead, Some("Punjab"), None).await;
        for i in 0..4 {
            add(&store, &format!("s{i}@x.io"), Role::Ca, Some("Kerala"), None).await;
        }
        for i in 0..2 {
            add(&store, &format!("e{i}@x.io"), Role::Ca, Some("Bihar"), None).await;
        }
        for i in 0..6 {
            let zone = format!("Z{i}");
            add(&store, &format!("h{i}@x.io"), Role::ZoneHead, None, Some(zone.as_str())).await;
        }

        let overview = admin_overview(&store, &store).await.unwrap();

        assert_eq!(overview.totals.zone_heads, 7);
        assert_eq!(overview.totals.campus_ambassadors, 6);
        assert_eq!(overview.totals.remaining_slots, MAX_CA_TOTAL - 6);
        assert_eq!(overview.totals.pending_reviews, 0);

        let zones: Vec<&str> = overview.zone_stats.iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(zones, vec!["EAST", "WEST", "NORTH", "SOUTH"]);
        assert_eq!(overview.zone_stats[0].ca_count, 2);
        let south = &overview.zone_stats[3];
        assert_eq!(south.ca_count, 4);
        assert_eq!(south.ca_limit, MAX_CA_PER_ZONE);
        assert_eq!(south.ca_points_total, 40);
        assert_eq!(south.ca_tasks_done, 4);
        assert!(south.head.is_none());
        let north = overview.zone_stats[2].head.as_ref().unwrap();
        assert_eq!(north.email, "north@x.io");

        assert_eq!(overview.recent_zone_heads.len(), RECENT_HEADS);
        assert_eq!(overview.recent_zone_heads[0].email, "h5@x.io");
        assert!(overview.recent_zone_heads.iter().all(|h| h.email != "north@x.io"));
    }

    #[test]
    fn test_ranking_respects_limit() {
        let users: Vec<_> = (1..=20).map(|i| ambassador(i, Role::Ca)).collect();
        assert_eq!(ranked(users.iter(), TOP_MEMBERS).len(), TOP_MEMBERS);
    }
}
