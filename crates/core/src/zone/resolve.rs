//! Prioritized zone resolution.

use super::{ZoneName, normalize_zone, zone_from_state};

/// Where a resolved zone came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneSource {
    /// Passed explicitly by the caller (admin promotion form).
    Explicit,
    /// Looked up from the ambassador's state.
    State,
    /// Normalized from the stored `zone` field.
    ZoneField,
    /// First characters of the pin code.
    PinPrefix,
    /// Nothing usable, defaulted to `INTERNATIONAL`.
    Fallback,
}

/// Result of running a resolution chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneResolution {
    Resolved { zone: ZoneName, source: ZoneSource },
    Unresolved,
}

impl ZoneResolution {
    /// The resolved zone, if any.
    #[must_use]
    pub const fn zone(&self) -> Option<&ZoneName> {
        match self {
            Self::Resolved { zone, .. } => Some(zone),
            Self::Unresolved => None,
        }
    }

    #[must_use]
    pub const fn source(&self) -> Option<ZoneSource> {
        match self {
            Self::Resolved { source, .. } => Some(*source),
            Self::Unresolved => None,
        }
    }

    #[must_use]
    pub fn into_zone(self) -> Option<ZoneName> {
        match self {
            Self::Resolved { zone, .. } => Some(zone),
            Self::Unresolved => None,
        }
    }

    /// Replace `Unresolved` with `INTERNATIONAL`.
    #[must_use]
    pub fn or_international(self) -> Self {
        match self {
            Self::Unresolved => Self::Resolved {
                zone: ZoneName::international(),
                source: ZoneSource::Fallback,
            },
            resolved @ Self::Resolved { .. } => resolved,
        }
    }

    /// Shorthand for `or_international().into_zone()`.
    #[must_use]
    pub fn zone_or_international(self) -> ZoneName {
        match self {
            Self::Resolved { zone, .. } => zone,
            Self::Unresolved => ZoneName::international(),
        }
    }

    fn or_else(self, next: impl FnOnce() -> Self) -> Self {
        match self {
            Self::Unresolved => next(),
            resolved @ Self::Resolved { .. } => resolved,
        }
    }
}

fn from_state(state: Option<&str>) -> ZoneResolution {
    state
        .and_then(zone_from_state)
        .map_or(ZoneResolution::Unresolved, |region| ZoneResolution::Resolved {
            zone: region.into(),
            source: ZoneSource::State,
        })
}

fn from_text(text: Option<&str>, source: ZoneSource) -> ZoneResolution {
    text.and_then(normalize_zone)
        .map_or(ZoneResolution::Unresolved, |zone| ZoneResolution::Resolved {
            zone,
            source,
        })
}

/// Canonical zone of an ambassador record.
///
/// The state wins over the stored zone field, so an ambassador who edits
/// their state is picked up by the next backfill even though their old zone
/// is still stored.
///
/// ```
/// use ca_portal_core::{resolve_zone, ZoneSource};
///
/// let res = resolve_zone(Some("Kerala"), Some("NORTH"));
/// assert_eq!(res.zone().unwrap(), "SOUTH");
/// assert_eq!(res.source(), Some(ZoneSource::State));
///
/// let res = resolve_zone(Some("Nowhere"), None);
/// assert_eq!(res.zone_or_international(), "INTERNATIONAL");
/// ```
#[must_use]
pub fn resolve_zone(state: Option<&str>, zone: Option<&str>) -> ZoneResolution {
    from_state(state).or_else(|| from_text(zone, ZoneSource::ZoneField))
}

/// Zone led by a zone head.
///
/// A head's stored zone was set on promotion and may differ from the region
/// of their home state, so the zone field is consulted first and the state
/// only fills in for legacy records that never had one.
///
/// ```
/// use ca_portal_core::resolve_head_zone;
///
/// assert_eq!(resolve_head_zone(Some("south zone"), Some("Punjab")).zone().unwrap(), "SOUTH");
/// assert_eq!(resolve_head_zone(None, Some("Punjab")).zone().unwrap(), "NORTH");
/// ```
#[must_use]
pub fn resolve_head_zone(zone: Option<&str>, state: Option<&str>) -> ZoneResolution {
    from_text(zone, ZoneSource::ZoneField).or_else(|| from_state(state))
}

/// Target zone for a user being promoted to zone head.
///
/// Order: explicit argument, stored zone, first three characters of the pin
/// code, then the state. The result is never `Unresolved`; an empty chain
/// falls back to `INTERNATIONAL`.
#[must_use]
pub fn resolve_promotion_target(
    explicit: Option<&str>,
    zone: Option<&str>,
    pin_code: Option<&str>,
    state: Option<&str>,
) -> ZoneResolution {
    let pin_prefix = pin_code.map(|pin| {
        let pin = pin.trim();
        pin.char_indices().nth(3).map_or(pin, |(idx, _)| &pin[..idx])
    });

    from_text(explicit, ZoneSource::Explicit)
        .or_else(|| from_text(zone, ZoneSource::ZoneField))
        .or_else(|| from_text(pin_prefix, ZoneSource::PinPrefix))
        .or_else(|| from_state(state))
        .or_international()
}
