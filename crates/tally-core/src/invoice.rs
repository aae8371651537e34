//! # Sale Numbers
//!
//! Format and parse human-readable sale numbers: `INV-YYYYMMDD-NNN`.
//!
//! ```text
//!   INV - 20261016 - 007
//!   ───   ────────   ───
//!    │       │        └── per tenant, per day sequence (≥ 3 digits, from 1)
//!    │       └─────────── calendar day of the sale
//!    └─────────────────── configurable prefix
//! ```
//!
//! Looking up the last number and inserting the next one are not atomic, so
//! two checkouts can compute the same candidate. Storage enforces uniqueness
//! and the orchestrator retries; this module only does the string work.

use chrono::NaiveDate;

/// Width the sequence is zero-padded to. Longer sequences are not truncated.
pub const SEQUENCE_WIDTH: usize = 3;

/// The day prefix shared by every sale number of one day, including the
/// trailing dash: `INV-20261016-`.
pub fn day_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}-", prefix, date.format("%Y%m%d"))
}

/// Formats a sale number.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::invoice::format_sale_number;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
/// assert_eq!(format_sale_number("INV", date, 7), "INV-20261016-007");
/// assert_eq!(format_sale_number("INV", date, 1234), "INV-20261016-1234");
/// ```
pub fn format_sale_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}{:0width$}",
        day_prefix(prefix, date),
        sequence,
        width = SEQUENCE_WIDTH
    )
}

/// Extracts the sequence from a sale number with the given day prefix.
///
/// Returns `None` when the prefix does not match, the suffix is not a number,
/// or the number is zero.
pub fn parse_sequence(sale_number: &str, day_prefix: &str) -> Option<u32> {
    let suffix = sale_number.strip_prefix(day_prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Computes the next sale number from the greatest existing one for the day.
///
/// Falls back to sequence 1 when there is no previous number or it cannot
/// be parsed.
pub fn next_sale_number(prefix: &str, date: NaiveDate, last: Option<&str>) -> String {
    let day = day_prefix(prefix, date);
    let next = last
        .and_then(|n| parse_sequence(n, &day))
        .map(|n| n.saturating_add(1))
        .unwrap_or(1);
    format_sale_number(prefix, date, next)
}

/// Checks that a string is a well-formed sale number for some day.
pub fn is_well_formed(prefix: &str, sale_number: &str) -> bool {
    let Some(rest) = sale_number
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('-'))
    else {
        return false;
    };
    let Some((date, seq)) = rest.split_once('-') else {
        return false;
    };
    NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
        && date.len() == 8
        && seq.len() >= SEQUENCE_WIDTH
        && seq.bytes().all(|b| b.is_ascii_digit())
        && seq.parse::<u32>().map(|n| n > 0).unwrap_or(false)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_first_number_of_the_day() {
        assert_eq!(next_sale_number("INV", day(), None), "INV-20261016-001");
    }

    #[test]
    fn test_increments_last_number() {
        assert_eq!(
            next_sale_number("INV", day(), Some("INV-20261016-041")),
            "INV-20261016-042"
        );
        assert_eq!(
            next_sale_number("INV", day(), Some("INV-20261016-999")),
            "INV-20261016-1000"
        );
    }

    #[test]
    fn test_unparseable_last_number_falls_back_to_one() {
        assert_eq!(
            next_sale_number("INV", day(), Some("INV-20261016-abc")),
            "INV-20261016-001"
        );
        assert_eq!(
            next_sale_number("INV", day(), Some("INV-20261016-000")),
            "INV-20261016-001"
        );
        // A number from another day never continues today's sequence
        assert_eq!(
            next_sale_number("INV", day(), Some("INV-20261015-120")),
            "INV-20261016-001"
        );
    }

    #[test]
    fn test_parse_sequence() {
        let prefix = day_prefix("INV", day());
        assert_eq!(parse_sequence("INV-20261016-007", &prefix), Some(7));
        assert_eq!(parse_sequence("INV-20261016-", &prefix), None);
        assert_eq!(parse_sequence("INV-20261016--5", &prefix), None);
        assert_eq!(parse_sequence("INV-20261016-+5", &prefix), None);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("INV", "INV-20261016-001"));
        assert!(is_well_formed("INV", "INV-20261016-1000"));
        assert!(!is_well_formed("INV", "INV-20261016-01"));
        assert!(!is_well_formed("INV", "INV-20261016-000"));
        assert!(!is_well_formed("INV", "INV-20261332-001"));
        assert!(!is_well_formed("INV", "SAL-20261016-001"));
    }
}
