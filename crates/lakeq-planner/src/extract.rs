//! Implicit date bounds scraped from comparison predicates in the SQL text.
//!
//! Only strict `'YYYY-MM-DD'` literals compared against a known timestamp-like
//! field count. Every match contributes a candidate; the widest span wins.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use lakeq_core::date::{DateBounds, DateRange};

/// Timestamp-like fields whose predicates imply a partition window.
pub const DATE_FIELDS: &[&str] = &[
    "created_at",
    "updated_at",
    "first_completed_at",
    "last_completed_at",
    "first_published_at",
    "last_published_at",
    "dropped_at",
    "withdrawn_at",
    "first_paid_at",
    "publish_last_requested_at",
    "last_graded_at",
    "updated_by_instructor_at",
];

const DATE_LITERAL: &str = r"'(\d{4}-\d{2}-\d{2})'";

fn field_alternation() -> String {
    DATE_FIELDS.join("|")
}

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{})\s*(>=|>|<=|<)\s*{}",
        field_alternation(),
        DATE_LITERAL
    ))
    .expect("comparison pattern compiles")
});

static BETWEEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{})\s+BETWEEN\s+{}\s+AND\s+{}",
        field_alternation(),
        DATE_LITERAL,
        DATE_LITERAL
    ))
    .expect("between pattern compiles")
});

/// Bounds found in `sql`, without defaults.
pub fn extract_bounds(sql: &str) -> DateBounds {
    let mut bounds = DateBounds::default();

    for caps in COMPARISON.captures_iter(sql) {
        let Some(date) = parse_date(&caps[2]) else {
            continue;
        };
        match &caps[1] {
            ">=" | ">" => bounds.widen_lower(date),
            _ => bounds.widen_upper(date),
        }
    }

    for caps in BETWEEN.captures_iter(sql) {
        if let Some(lo) = parse_date(&caps[1]) {
            bounds.widen_lower(lo);
        }
        if let Some(hi) = parse_date(&caps[2]) {
            bounds.widen_upper(hi);
        }
    }

    bounds
}

/// Date range implied by `sql`, defaulting each missing bound independently.
/// Never fails.
pub fn extract_range(sql: &str) -> DateRange {
    extract_bounds(sql).resolve()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn both_bounds_from_one_field() {
        let r = extract_range(
            "SELECT * FROM t WHERE created_at >= '2023-02-01' AND created_at <= '2024-11-30' LIMIT 10",
        );
        assert_eq!(r, DateRange::new(d(2023, 2, 1), d(2024, 11, 30)).unwrap());
    }

    #[test]
    fn no_predicate_gives_fallback() {
        assert_eq!(extract_range("SELECT * FROM t"), DateRange::fallback());
    }

    #[test]
    fn conflicting_fields_widen_to_minimum_lower() {
        let r = extract_range(
            "SELECT * FROM t WHERE created_at >= '2023-01-01' OR updated_at >= '2022-06-01'",
        );
        assert_eq!(r.start(), d(2022, 6, 1));
        assert_eq!(r.end(), d(2024, 12, 31));
    }

    #[test]
    fn between_is_case_insensitive() {
        let b = extract_bounds(
            "select * from t where LAST_GRADED_AT between '2021-03-04' and '2021-05-06'",
        );
        assert_eq!(b.lower, Some(d(2021, 3, 4)));
        assert_eq!(b.upper, Some(d(2021, 5, 6)));
    }

    #[test]
    fn strict_operators_count_as_bounds() {
        let b = extract_bounds("WHERE t.dropped_at > '2020-01-02' AND t.dropped_at < '2020-02-03'");
        assert_eq!(b.lower, Some(d(2020, 1, 2)));
        assert_eq!(b.upper, Some(d(2020, 2, 3)));
    }

    #[test]
    fn non_strict_literals_and_unknown_fields_are_ignored() {
        let b = extract_bounds(
            "WHERE created_at >= '2023-01-01 00:00:00' \
             AND graded_on >= '2019-01-01' \
             AND updated_at <= '2023-13-45' \
             AND created_at <> '2018-01-01'",
        );
        assert_eq!(b, DateBounds::default());
    }

    #[test]
    fn suffix_of_longer_field_does_not_match() {
        // `my_created_at` is not a known field.
        let b = extract_bounds("WHERE my_created_at >= '2019-01-01'");
        assert_eq!(b.lower, None);
    }
}
