//! Large/small result prediction.
//!
//! Rules, checked against the lowercased text:
//! 1. A first `LIMIT n` with `n <= threshold` means small. This short-circuits.
//! 2. Otherwise the query is large iff no aggregation marker appears.
//!
//! A `LIMIT` above the threshold caps nothing useful, so it is treated like a
//! missing one. Aggregations hidden behind aliases or subqueries are missed;
//! that false negative is accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT_THRESHOLD: u64 = 1_000_000;

/// Substrings that suggest the result collapses rows.
pub const AGGREGATION_MARKERS: &[&str] = &["count", "sum", "avg", "max", "min", "group by"];

static LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blimit\s+(\d+)").expect("limit pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Fetched in one call.
    Small,
    /// Streamed in bounded pages.
    Large,
}

/// First `LIMIT` value in the text, if any. Values too large for `u64`
/// saturate.
pub fn first_limit(sql: &str) -> Option<u64> {
    LIMIT
        .captures(sql)
        .map(|caps| caps[1].parse::<u64>().unwrap_or(u64::MAX))
}

pub fn has_aggregation(sql: &str) -> bool {
    let lower = sql.to_lowercase();
    AGGREGATION_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn classify_with_threshold(sql: &str, limit_threshold: u64) -> SizeClass {
    if matches!(first_limit(sql), Some(n) if n <= limit_threshold) {
        return SizeClass::Small;
    }
    if has_aggregation(sql) {
        SizeClass::Small
    } else {
        SizeClass::Large
    }
}

pub fn classify(sql: &str) -> SizeClass {
    classify_with_threshold(sql, DEFAULT_LIMIT_THRESHOLD)
}

pub fn is_large(sql: &str) -> bool {
    classify(sql) == SizeClass::Large
}
