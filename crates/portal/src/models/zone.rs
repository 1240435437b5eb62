//! Zone directory domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ca_portal_core::{UserId, ZoneId, ZoneName};

use super::HeadLink;

/// A configured zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    /// Canonical name, unique across zones.
    pub name: ZoneName,
    pub display_name: Option<String>,
    /// Postal-code prefixes that belong to this zone.
    pub pin_prefixes: Vec<String>,
    pub head_user_id: Option<UserId>,
    pub head_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// True when any configured prefix is a prefix of `pin`.
    ///
    /// ```
    /// # use ca_portal::models::Zone;
    /// # use ca_portal_core::{ZoneId, ZoneName};
    /// # let now = chrono::Utc::now();
    /// let zone = Zone {
    ///     id: ZoneId::new(1),
    ///     name: ZoneName::parse("north").unwrap(),
    ///     display_name: None,
    ///     pin_prefixes: vec!["12".into(), "34".into()],
    ///     head_user_id: None,
    ///     head_name: None,
    ///     created_at: now,
    ///     updated_at: now,
    /// };
    /// assert!(zone.matches_pin("123456"));
    /// assert!(!zone.matches_pin("567890"));
    /// ```
    #[must_use]
    pub fn matches_pin(&self, pin: &str) -> bool {
        pin_in_prefixes(pin, &self.pin_prefixes)
    }

    /// Head pointer as a link, if the zone has a head.
    #[must_use]
    pub fn head(&self) -> Option<HeadLink> {
        self.head_user_id.map(|id| HeadLink {
            id,
            name: self.head_name.clone(),
        })
    }
}

/// True when `pin` starts with one of `prefixes`.
///
/// Both sides are trimmed and blank prefixes never match. Zone records and
/// the bulk ambassador filters share this rule.
#[must_use]
pub fn pin_in_prefixes<S: AsRef<str>>(pin: &str, prefixes: &[S]) -> bool {
    let pin = pin.trim();
    prefixes.iter().any(|prefix| {
        let prefix = prefix.as_ref().trim();
        !prefix.is_empty() && pin.starts_with(prefix)
    })
}

/// Trim prefixes, drop empty entries and duplicates, keep first-seen order.
#[must_use]
pub fn clean_pin_prefixes<I, S>(prefixes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cleaned: Vec<String> = Vec::new();
    for prefix in prefixes {
        let prefix = prefix.as_ref().trim();
        if !prefix.is_empty() && !cleaned.iter().any(|p| p == prefix) {
            cleaned.push(prefix.to_owned());
        }
    }
    cleaned
}

/// A zone to insert.
#[derive(Debug, Clone)]
pub struct NewZone {
    pub name: ZoneName,
    pub display_name: Option<String>,
    pub pin_prefixes: Vec<String>,
}

/// Partial update of a zone record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZonePatch {
    pub display_name: Option<Option<String>>,
    pub pin_prefixes: Option<Vec<String>>,
    /// Sets `head_user_id` and `head_name` together.
    pub head: Option<Option<HeadLink>>,
}

impl ZonePatch {
    #[must_use]
    pub fn set_head(head: HeadLink) -> Self {
        Self {
            head: Some(Some(head)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clear_head() -> Self {
        Self {
            head: Some(None),
            ..Self::default()
        }
    }

    pub fn apply(&self, zone: &mut Zone) {
        if let Some(display_name) = &self.display_name {
            zone.display_name.clone_from(display_name);
        }
        if let Some(prefixes) = &self.pin_prefixes {
            zone.pin_prefixes.clone_from(prefixes);
        }
        if let Some(head) = &self.head {
            zone.head_user_id = head.as_ref().map(|h| h.id);
            zone.head_name = head.as_ref().and_then(|h| h.name.clone());
        }
    }
}

/// Set of zones targeted by a bulk update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneFilter {
    HeadedBy(UserId),
    /// Headed by `head`, except the zone named `keep`.
    HeadedByExcept { head: UserId, keep: ZoneName },
}

impl ZoneFilter {
    #[must_use]
    pub fn matches(&self, zone: &Zone) -> bool {
        match self {
            Self::HeadedBy(head) => zone.head_user_id == Some(*head),
            Self::HeadedByExcept { head, keep } => {
                zone.head_user_id == Some(*head) && zone.name != *keep
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn zone(name: &str, prefixes: &[&str]) -> Zone {
        Zone {
            id: ZoneId::new(1),
            name: ZoneName::parse(name).unwrap(),
            display_name: None,
            pin_prefixes: prefixes.iter().map(ToString::to_string).collect(),
            head_user_id: None,
            head_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_matches_pin() {
        let z = zone("north", &["12", "34"]);
        assert!(z.matches_pin("123456"));
        assert!(z.matches_pin("340001"));
        assert!(!z.matches_pin("567890"));
        assert!(!zone("north", &[]).matches_pin("123456"));
        assert!(z.matches_pin(" 123456 "));
        assert!(zone("north", &[" 12 ", ""]).matches_pin("123456"));
        assert!(!zone("north", &["  "]).matches_pin("123456"));
    }

    #[test]
    fn test_clean_pin_prefixes() {
        let cleaned = clean_pin_prefixes([" 11 ", "", "12", "11", "  "]);
        assert_eq!(cleaned, vec!["11".to_owned(), "12".to_owned()]);
    }

    #[test]
    fn test_head_filters() {
        let mut z = zone("south", &[]);
        ZonePatch::set_head(HeadLink {
            id: UserId::new(4),
            name: None,
        })
        .apply(&mut z);

        assert!(ZoneFilter::HeadedBy(UserId::new(4)).matches(&z));
        assert!(
            !ZoneFilter::HeadedByExcept {
                head: UserId::new(4),
                keep: ZoneName::parse("SOUTH").unwrap(),
            }
            .matches(&z)
        );

        ZonePatch::clear_head().apply(&mut z);
        assert_eq!(z.head(), None);
    }
}
