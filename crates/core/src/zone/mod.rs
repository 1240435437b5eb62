//! Canonical zones and how ambassadors are mapped onto them.
//!
//! A zone is always handled as a [`ZoneName`], which can only be produced by
//! [`normalize_zone`]. Raw strings from registration forms, CSV imports or
//! admin edits pass through the normalizer before they are compared or stored.
//!
//! - `normalize`: free text to canonical token
//! - `states`: Indian state membership lists for the four compass regions
//! - `resolve`: the prioritized resolution chains used by every caller

mod normalize;
mod resolve;
mod states;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use normalize::normalize_zone;
pub use resolve::{
    ZoneResolution, ZoneSource, resolve_head_zone, resolve_promotion_target, resolve_zone,
};
pub use states::zone_from_state;

/// A canonical zone token.
///
/// One of `NORTH`, `SOUTH`, `EAST`, `WEST`, `INTERNATIONAL`, a numeric pin-code
/// prefix, or an uppercased free-text name. Deserializing normalizes the
/// input, so `"north zone"` arrives as `NORTH`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneName(String);

/// Error returned when a zone string normalizes to nothing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("zone name is empty")]
pub struct EmptyZoneName;

impl ZoneName {
    /// Normalize `raw` into a canonical zone.
    ///
    /// Alias for [`normalize_zone`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        normalize_zone(raw)
    }

    /// The catch-all zone for ambassadors with no usable location.
    #[must_use]
    pub fn international() -> Self {
        Region::International.into()
    }

    /// Wrap an already-normalized token. Only the normalizer calls this.
    pub(crate) const fn from_normalized(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The first `n` characters of the token, used for pin-code prefix
    /// matching when a zone head moves to a numeric zone.
    #[must_use]
    pub fn prefix(&self, n: usize) -> &str {
        self.0
            .char_indices()
            .nth(n)
            .map_or(self.0.as_str(), |(idx, _)| &self.0[..idx])
    }

    /// True when the token is a pin-code prefix rather than a named zone.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ZoneName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ZoneName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ZoneName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::str::FromStr for ZoneName {
    type Err = EmptyZoneName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_zone(s).ok_or(EmptyZoneName)
    }
}

impl TryFrom<String> for ZoneName {
    type Error = EmptyZoneName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ZoneName> for String {
    fn from(zone: ZoneName) -> Self {
        zone.0
    }
}

impl From<Region> for ZoneName {
    fn from(region: Region) -> Self {
        Self(region.as_str().to_owned())
    }
}

/// The fixed named zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    North,
    South,
    East,
    West,
    International,
}

impl Region {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "NORTH",
            Self::South => "SOUTH",
            Self::East => "EAST",
            Self::West => "WEST",
            Self::International => "INTERNATIONAL",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_normalizes() {
        let zone: ZoneName = serde_json::from_str("\" northern zone \"").unwrap();
        assert_eq!(zone, "NORTH");
        assert!(serde_json::from_str::<ZoneName>("\"  \"").is_err());
    }

    #[test]
    fn test_prefix() {
        let zone = ZoneName::parse("560034").unwrap();
        assert_eq!(zone.prefix(3), "560");
        assert!(zone.is_numeric());

        let short = ZoneName::parse("12").unwrap();
        assert_eq!(short.prefix(3), "12");
    }

    #[test]
    fn test_region_conversion() {
        assert_eq!(ZoneName::from(Region::East), "EAST");
        assert_eq!(ZoneName::international().as_str(), "INTERNATIONAL");
        assert!(!ZoneName::international().is_numeric());
    }
}
