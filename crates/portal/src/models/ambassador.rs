//! Ambassador (user) domain types.
//!
//! Every registered user is an ambassador record; the role decides whether
//! they are a campus ambassador, a zone head or an admin.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ca_portal_core::{
    Email, Role, UserId, ZoneName, ZoneResolution, resolve_head_zone, resolve_zone,
};

use super::zone::pin_in_prefixes;

/// A portal user (domain type).
///
/// The password hash is never part of this struct; it is only returned by
/// [`crate::db::DirectoryStore::password_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ambassador {
    pub id: UserId,
    pub email: Email,
    /// External identifier (college roll number, import id).
    pub uid: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub role: Role,
    /// Stored zone. Usually canonical, but legacy rows may hold free text.
    pub zone: Option<String>,
    pub zone_head_id: Option<UserId>,
    pub zone_head_name: Option<String>,
    pub referral_code: Option<String>,
    pub points: i32,
    pub tasks_done: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ambassador {
    /// Full name if set, otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.email.as_str())
    }

    /// Resolution chain for this record as an ambassador (state first).
    #[must_use]
    pub fn resolve_zone(&self) -> ZoneResolution {
        resolve_zone(self.state.as_deref(), self.zone.as_deref())
    }

    /// Canonical zone, defaulting to `INTERNATIONAL`.
    #[must_use]
    pub fn canonical_zone(&self) -> ZoneName {
        self.resolve_zone().zone_or_international()
    }

    /// Zone this record leads, if it is read as a zone head (zone field first).
    #[must_use]
    pub fn headed_zone(&self) -> Option<ZoneName> {
        resolve_head_zone(self.zone.as_deref(), self.state.as_deref()).into_zone()
    }

    /// Link to this user for the denormalized `zone_head_*` fields.
    #[must_use]
    pub fn as_head_link(&self) -> HeadLink {
        HeadLink {
            id: self.id,
            name: Some(self.display_name().to_owned()),
        }
    }
}

/// A new user to insert.
#[derive(Debug, Clone)]
pub struct NewAmbassador {
    pub email: Email,
    pub password_hash: String,
    pub uid: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub role: Role,
    pub zone: Option<ZoneName>,
}

impl NewAmbassador {
    /// A bare record with only credentials; profile fields are empty.
    #[must_use]
    pub const fn new(email: Email, password_hash: String, role: Role) -> Self {
        Self {
            email,
            password_hash,
            uid: None,
            full_name: None,
            phone: None,
            college: None,
            pin_code: None,
            city: None,
            state: None,
            role,
            zone: None,
        }
    }
}

/// Denormalized pointer to a zone head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadLink {
    pub id: UserId,
    pub name: Option<String>,
}

/// Partial update of an ambassador record.
///
/// `None` leaves a field alone. For nullable fields the inner `Option`
/// is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbassadorPatch {
    pub role: Option<Role>,
    pub zone: Option<Option<String>>,
    /// Sets `zone_head_id` and `zone_head_name` together.
    pub zone_head: Option<Option<HeadLink>>,
    pub referral_code: Option<String>,
    pub points: Option<i32>,
    pub tasks_done: Option<i32>,
}

impl AmbassadorPatch {
    /// Clear the zone head link and nothing else.
    #[must_use]
    pub fn unlink() -> Self {
        Self {
            zone_head: Some(None),
            ..Self::default()
        }
    }

    /// Point at `head` and leave the stored zone alone.
    #[must_use]
    pub fn link(head: HeadLink) -> Self {
        Self {
            zone_head: Some(Some(head)),
            ..Self::default()
        }
    }

    /// Write the canonical zone, and the head link when one is known.
    #[must_use]
    pub fn assign(zone: &ZoneName, head: Option<HeadLink>) -> Self {
        Self {
            zone: Some(Some(zone.to_string())),
            zone_head: head.map(Some),
            ..Self::default()
        }
    }

    /// Apply the patch to an in-memory record.
    pub fn apply(&self, ambassador: &mut Ambassador) {
        if let Some(role) = self.role {
            ambassador.role = role;
        }
        if let Some(zone) = &self.zone {
            ambassador.zone.clone_from(zone);
        }
        if let Some(head) = &self.zone_head {
            ambassador.zone_head_id = head.as_ref().map(|h| h.id);
            ambassador.zone_head_name = head.as_ref().and_then(|h| h.name.clone());
        }
        if let Some(code) = &self.referral_code {
            ambassador.referral_code = Some(code.clone());
        }
        if let Some(points) = self.points {
            ambassador.points = points;
        }
        if let Some(tasks_done) = self.tasks_done {
            ambassador.tasks_done = tasks_done;
        }
    }
}

/// How to find a single ambassador.
#[derive(Debug, Clone, Copy)]
pub enum AmbassadorLookup<'a> {
    Id(UserId),
    Email(&'a Email),
    Uid(&'a str),
    Phone(&'a str),
    ReferralCode(&'a str),
}

impl AmbassadorLookup<'_> {
    /// Whether `ambassador` is the record this lookup names.
    #[must_use]
    pub fn matches(&self, ambassador: &Ambassador) -> bool {
        match self {
            Self::Id(id) => ambassador.id == *id,
            Self::Email(email) => ambassador.email == **email,
            Self::Uid(uid) => ambassador.uid.as_deref() == Some(*uid),
            Self::Phone(phone) => ambassador.phone.as_deref() == Some(*phone),
            Self::ReferralCode(code) => ambassador.referral_code.as_deref() == Some(*code),
        }
    }
}

/// Set of campus ambassadors targeted by a bulk update.
///
/// Every variant only ever matches records with role `CA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmbassadorFilter {
    /// Linked to the given head.
    LinkedTo(UserId),
    /// Stored zone equals `zone`, pin code equals `zone`, or pin code starts
    /// with `pin_prefix`.
    MatchingZone { zone: String, pin_prefix: String },
    /// Stored zone equals `zone`, or pin code starts with one of `prefixes`.
    InZoneOrPinPrefixes { zone: String, prefixes: Vec<String> },
    /// Linked to `head` but no longer [`AmbassadorFilter::MatchingZone`].
    LinkedOutside {
        head: UserId,
        zone: String,
        pin_prefix: String,
    },
}

impl AmbassadorFilter {
    /// Whether `ambassador` falls inside the filter.
    #[must_use]
    pub fn matches(&self, ambassador: &Ambassador) -> bool {
        if ambassador.role != Role::Ca {
            return false;
        }

        let zone_is = |zone: &str| ambassador.zone.as_deref() == Some(zone);
        let pin = ambassador.pin_code.as_deref();
        let pin_matches = |zone: &str, prefix: &str| {
            pin.is_some_and(|pin| pin == zone || (!prefix.is_empty() && pin.starts_with(prefix)))
        };

        match self {
            Self::LinkedTo(head) => ambassador.zone_head_id == Some(*head),
            Self::MatchingZone { zone, pin_prefix } => zone_is(zone) || pin_matches(zone, pin_prefix),
            Self::InZoneOrPinPrefixes { zone, prefixes } => {
                zone_is(zone) || pin.is_some_and(|pin| pin_in_prefixes(pin, prefixes))
            }
            Self::LinkedOutside {
                head,
                zone,
                pin_prefix,
            } => {
                ambassador.zone_head_id == Some(*head)
                    && !(zone_is(zone) || pin_matches(zone, pin_prefix))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ambassador(id: i32, role: Role) -> Ambassador {
        Ambassador {
            id: UserId::new(id),
            email: Email::parse(&format!("user{id}@campus.test")).unwrap(),
            uid: None,
            full_name: None,
            phone: None,
            college: None,
            pin_code: None,
            city: None,
            state: None,
            role,
            zone: None,
            zone_head_id: None,
            zone_head_name: None,
            referral_code: None,
            points: 0,
            tasks_done: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = ambassador(1, Role::Ca);
        assert_eq!(user.display_name(), "user1@campus.test");

        user.full_name = Some("  ".to_owned());
        assert_eq!(user.display_name(), "user1@campus.test");

        user.full_name = Some("Asha Rao".to_owned());
        assert_eq!(user.display_name(), "Asha Rao");
    }

    #[test]
    fn test_canonical_zone_prefers_state() {
        let mut user = ambassador(1, Role::Ca);
        assert_eq!(user.canonical_zone(), "INTERNATIONAL");

        user.zone = Some("west zone".to_owned());
        assert_eq!(user.canonical_zone(), "WEST");

        user.state = Some("Kerala".to_owned());
        assert_eq!(user.canonical_zone(), "SOUTH");
        assert_eq!(user.headed_zone().unwrap(), "WEST");
    }

    #[test]
    fn test_patch_apply() {
        let mut user = ambassador(2, Role::Ca);
        let head = HeadLink {
            id: UserId::new(9),
            name: Some("Head".to_owned()),
        };
        AmbassadorPatch::assign(&ZoneName::parse("north").unwrap(), Some(head)).apply(&mut user);
        assert_eq!(user.zone.as_deref(), Some("NORTH"));
        assert_eq!(user.zone_head_id, Some(UserId::new(9)));

        AmbassadorPatch::unlink().apply(&mut user);
        assert_eq!(user.zone.as_deref(), Some("NORTH"));
        assert_eq!(user.zone_head_id, None);
        assert_eq!(user.zone_head_name, None);
    }

    #[test]
    fn test_filters_only_match_cas() {
        let mut head = ambassador(3, Role::ZoneHead);
        head.zone = Some("NORTH".to_owned());
        let filter = AmbassadorFilter::MatchingZone {
            zone: "NORTH".to_owned(),
            pin_prefix: "NOR".to_owned(),
        };
        assert!(!filter.matches(&head));

        head.role = Role::Ca;
        assert!(filter.matches(&head));
    }

    #[test]
    fn test_pin_filters() {
        let mut user = ambassador(4, Role::Ca);
        user.pin_code = Some("110017".to_owned());

        let by_prefix = AmbassadorFilter::MatchingZone {
            zone: "110".to_owned(),
            pin_prefix: "110".to_owned(),
        };
        assert!(by_prefix.matches(&user));

        let by_list = AmbassadorFilter::InZoneOrPinPrefixes {
            zone: "DELHI NCR".to_owned(),
            prefixes: vec!["12".to_owned(), "11".to_owned()],
        };
        assert!(by_list.matches(&user));

        // Same trimming as a zone record.
        user.pin_code = Some(" 110017".to_owned());
        let padded = AmbassadorFilter::InZoneOrPinPrefixes {
            zone: "DELHI NCR".to_owned(),
            prefixes: vec![" 11 ".to_owned()],
        };
        assert!(padded.matches(&user));
        assert!(
            !AmbassadorFilter::InZoneOrPinPrefixes {
                zone: "DELHI NCR".to_owned(),
                prefixes: vec!["  ".to_owned()],
            }
            .matches(&user)
        );
        user.pin_code = Some("110017".to_owned());

        user.zone_head_id = Some(UserId::new(7));
        let outside = AmbassadorFilter::LinkedOutside {
            head: UserId::new(7),
            zone: "560".to_owned(),
            pin_prefix: "560".to_owned(),
        };
        assert!(outside.matches(&user));
    }
}
