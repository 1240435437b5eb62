//! Referral code candidates.
//!
//! Codes are derived from the owner's contact details so they are easy to
//! read out loud. Uniqueness is the caller's job: it probes
//! [`referral_base`], then [`with_suffix`] for `1, 2, ...` until a free code
//! is found, and falls back to a random token after
//! [`MAX_SUFFIX_ATTEMPTS`] collisions.

use crate::Email;

/// Longest code ever produced.
pub const MAX_CODE_LEN: usize = 10;

/// Collisions tolerated before giving up on the derived base.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Length of the random fallback token.
pub const RANDOM_CODE_LEN: usize = 6;

/// Characters used by the random fallback token (base36, uppercase).
pub const RANDOM_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Deterministic base code: up to five alphanumerics from the email local
/// part followed by up to five trailing digits of the phone number,
/// uppercased. `None` when both contribute nothing.
///
/// ```
/// use ca_portal_core::{Email, referral::referral_base};
///
/// let email = Email::parse("ri.ya_sharma@college.edu").unwrap();
/// assert_eq!(referral_base(&email, Some("+91 98765 43210")).unwrap(), "RIYAS43210");
/// ```
#[must_use]
pub fn referral_base(email: &Email, phone: Option<&str>) -> Option<String> {
    let mut code: String = email
        .local_part()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(5)
        .collect();

    if let Some(phone) = phone {
        let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
        let start = digits.len().saturating_sub(5);
        code.extend(&digits[start..]);
    }

    if code.is_empty() {
        None
    } else {
        Some(code.to_ascii_uppercase())
    }
}

/// `base` with numeric suffix `n`, truncating the base so the whole code
/// stays within [`MAX_CODE_LEN`].
#[must_use]
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = n.to_string();
    let keep = MAX_CODE_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{suffix}", &base[..keep])
}
