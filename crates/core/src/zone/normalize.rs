//! Free text to canonical zone token.

use super::ZoneName;

/// Normalize a raw zone string.
///
/// Returns `None` when nothing meaningful is left after cleaning. Otherwise:
///
/// 1. Internal whitespace is collapsed and surrounding punctuation trimmed.
/// 2. A trailing `zone` word (optionally followed by `.`) is stripped, as
///    many times as it occurs, so `"North Zone Zone"` cleans to `North`.
/// 3. Purely numeric results are returned as-is (pin-code prefixes).
/// 4. `north`/`northern` and the other compass synonyms map to their region.
/// 5. Anything else is uppercased.
///
/// The output is a fixed point: normalizing it again returns it unchanged.
///
/// ```
/// use ca_portal_core::normalize_zone;
///
/// assert_eq!(normalize_zone("  southern zone. ").unwrap(), "SOUTH");
/// assert_eq!(normalize_zone("560").unwrap(), "560");
/// assert_eq!(normalize_zone("North East").unwrap(), "NORTH EAST");
/// assert!(normalize_zone(" - ").is_none());
/// ```
#[must_use]
pub fn normalize_zone(raw: &str) -> Option<ZoneName> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Some(ZoneName::from_normalized(cleaned));
    }

    let upper = cleaned.to_uppercase();
    let token = match upper.as_str() {
        "NORTH" | "NORTHERN" => "NORTH".to_owned(),
        "SOUTH" | "SOUTHERN" => "SOUTH".to_owned(),
        "EAST" | "EASTERN" => "EAST".to_owned(),
        "WEST" | "WESTERN" => "WEST".to_owned(),
        _ => upper,
    };
    Some(ZoneName::from_normalized(token))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn trim_punctuation(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_alphanumeric())
}

fn clean(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut rest = trim_punctuation(&collapsed);

    while let Some(stripped) = strip_zone_suffix(rest) {
        rest = trim_punctuation(stripped);
    }

    rest.to_owned()
}

/// Strip a trailing standalone `zone` word, if present.
fn strip_zone_suffix(s: &str) -> Option<&str> {
    const SUFFIX: &str = "zone";

    let split = s.len().checked_sub(SUFFIX.len())?;
    if !s.is_char_boundary(split) || !s[split..].eq_ignore_ascii_case(SUFFIX) {
        return None;
    }

    let head = &s[..split];
    match head.chars().next_back() {
        Some(c) if is_word_char(c) => None,
        _ => Some(head),
    }
}
