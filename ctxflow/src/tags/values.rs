//! Tag value normalisation.
//!
//! Tag backends accept at most [`MAX_TAG_VALUE_LENGTH`] printable ASCII
//! characters per value.

use tracing::debug;

/// Maximum number of characters in a tag value.
pub const MAX_TAG_VALUE_LENGTH: usize = 255;

/// Placeholder for values that cannot be represented as a tag.
pub const INVALID_TAG_VALUE: &str = "<invalid>";

/// Returns true if `value` is accepted by tag backends unchanged.
#[must_use]
pub fn is_valid_tag_value(value: &str) -> bool {
    value.len() <= MAX_TAG_VALUE_LENGTH && value.chars().all(is_printable)
}

/// Truncates over-long values and replaces non-printable ones.
#[must_use]
pub fn sanitize_tag_value(value: &str) -> String {
    if !value.chars().all(is_printable) {
        debug!(value, "Replacing non-printable tag value");
        return INVALID_TAG_VALUE.to_string();
    }
    if value.len() > MAX_TAG_VALUE_LENGTH {
        return value[..MAX_TAG_VALUE_LENGTH].to_string();
    }
    value.to_string()
}

fn is_printable(c: char) -> bool {
    (' '..='~').contains(&c)
}
