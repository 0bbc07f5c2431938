//! Location id generation.
//!
//! Ids have the shape `{country}_{region}_{city}` where the region and city
//! segments are ASCII-folded, lower-cased, vowel-stripped abbreviations of at
//! most [`ABBREV_LEN`] characters. Two places whose names fold to the same
//! abbreviation share an id; the later write wins.

use crate::types::LocationId;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Maximum length of the region and city segments.
pub const ABBREV_LEN: usize = 5;

/// Fold text to printable ASCII.
///
/// Decomposes (NFKD), drops combining marks, replaces anything outside
/// printable ASCII with a space, then trims and collapses whitespace runs.
///
/// ```rust
/// use geonear::compute::ids::ascii_fold;
///
/// assert_eq!(ascii_fold("  São   Paulo "), "Sao Paulo");
/// assert_eq!(ascii_fold("Tōkyō"), "Tokyo");
/// ```
pub fn ascii_fold(text: &str) -> String {
    let replaced: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn abbreviate(text: &str) -> String {
    ascii_fold(text)
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(ABBREV_LEN)
        .collect()
}

/// Build the id of a location from its city, admin region and country code.
///
/// Pure and deterministic. The country code is only lower-cased; an empty
/// region yields an empty middle segment.
///
/// ```rust
/// use geonear::compute::ids::make_id;
///
/// assert_eq!(make_id("Tōkyō", "Tōkyō", "JP").as_str(), "jp_tky_tky");
/// assert_eq!(make_id("Singapore", "", "SG").as_str(), "sg__sngpr");
/// ```
pub fn make_id(city: &str, admin_region: &str, country_code: &str) -> LocationId {
    let country: String = country_code
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    LocationId::from_parts(&country, &abbreviate(admin_region), &abbreviate(city))
}
