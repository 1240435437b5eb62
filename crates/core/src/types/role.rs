//! Portal roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

/// Role of a portal user.
///
/// Serializes as `ADMIN`, `ZONE_HEAD` or `CA`. Parsing is lenient: case,
/// spaces and hyphens are ignored and the legacy spellings `ZONAL_HEAD` and
/// `CAMPUS_AMBASSADOR` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "portal.user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Role {
    /// Full access, including user and zone management.
    Admin,
    /// Heads one canonical zone and reviews its submissions.
    ZoneHead,
    /// Campus ambassador.
    #[default]
    #[serde(rename = "CA")]
    Ca,
}

impl Role {
    /// Wire and database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::ZoneHead => "ZONE_HEAD",
            Self::Ca => "CA",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        match key.as_str() {
            "ADMIN" => Ok(Self::Admin),
            "ZONE_HEAD" | "ZONAL_HEAD" | "ZONEHEAD" => Ok(Self::ZoneHead),
            "CA" | "CAMPUS_AMBASSADOR" => Ok(Self::Ca),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = RoleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
