//! State and union territory membership of the compass regions.

use super::Region;

const NORTH: &[&str] = &[
    "jammu & kashmir",
    "jammu and kashmir",
    "ladakh",
    "himachal pradesh",
    "punjab",
    "haryana",
    "chandigarh",
    "delhi",
    "new delhi",
    "uttarakhand",
    "uttar pradesh",
    "rajasthan",
];

const WEST: &[&str] = &["gujarat", "maharashtra", "goa", "madhya pradesh"];

const EAST: &[&str] = &[
    "bihar",
    "jharkhand",
    "west bengal",
    "odisha",
    "orissa",
    "assam",
    "arunachal pradesh",
    "meghalaya",
    "manipur",
    "mizoram",
    "nagaland",
    "tripura",
    "sikkim",
];

const SOUTH: &[&str] = &[
    "karnataka",
    "kerala",
    "tamil nadu",
    "telangana",
    "andhra pradesh",
];

/// Map a state name to its region.
///
/// Matching ignores case and extra whitespace. States outside the four lists
/// (and empty input) return `None`; the caller decides the fallback.
#[must_use]
pub fn zone_from_state(state: &str) -> Option<Region> {
    let key = state.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if key.is_empty() {
        return None;
    }

    [
        (NORTH, Region::North),
        (WEST, Region::West),
        (EAST, Region::East),
        (SOUTH, Region::South),
    ]
    .into_iter()
    .find(|(states, _)| states.contains(&key.as_str()))
    .map(|(_, region)| region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_region() {
        assert_eq!(zone_from_state("Punjab"), Some(Region::North));
        assert_eq!(zone_from_state("Goa"), Some(Region::West));
        assert_eq!(zone_from_state("West Bengal"), Some(Region::East));
        assert_eq!(zone_from_state("Kerala"), Some(Region::South));
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(zone_from_state("  TAMIL   nadu "), Some(Region::South));
        assert_eq!(zone_from_state("jammu & KASHMIR"), Some(Region::North));
    }

    #[test]
    fn test_unknown_state() {
        assert_eq!(zone_from_state("Puducherry"), None);
        assert_eq!(zone_from_state(""), None);
        assert_eq!(zone_from_state("California"), None);
    }
}
