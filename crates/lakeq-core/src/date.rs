//! Calendar date ranges used to pick partitions.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Inclusive `[start, end]` calendar window. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Fallback window used when neither the caller nor the query names a bound.
    pub fn fallback() -> Self {
        Self {
            start: DateBounds::DEFAULT_START,
            end: DateBounds::DEFAULT_END,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both endpoints included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every calendar year touched by the range, ascending.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start.year()..=self.end.year()
    }

    /// Every calendar day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Optional lower/upper bounds gathered before defaults are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub lower: Option<NaiveDate>,
    pub upper: Option<NaiveDate>,
}

impl DateBounds {
    pub const DEFAULT_START: NaiveDate = match NaiveDate::from_ymd_opt(2024, 1, 1) {
        Some(d) => d,
        None => panic!("invalid default start"),
    };
    pub const DEFAULT_END: NaiveDate = match NaiveDate::from_ymd_opt(2024, 12, 31) {
        Some(d) => d,
        None => panic!("invalid default end"),
    };

    /// Keep the widest span: minimum lower, maximum upper.
    pub fn widen_lower(&mut self, candidate: NaiveDate) {
        self.lower = Some(self.lower.map_or(candidate, |cur| cur.min(candidate)));
    }

    pub fn widen_upper(&mut self, candidate: NaiveDate) {
        self.upper = Some(self.upper.map_or(candidate, |cur| cur.max(candidate)));
    }

    /// Fill gaps from `fallback` (explicit caller bounds take precedence
    /// over anything found in the query text).
    pub fn or(self, fallback: DateBounds) -> DateBounds {
        DateBounds {
            lower: self.lower.or(fallback.lower),
            upper: self.upper.or(fallback.upper),
        }
    }

    /// Apply the fallback window to missing bounds.
    ///
    /// A defaulted bound that lands on the wrong side of a found bound is
    /// pulled to the found bound's calendar year. Two found bounds that are
    /// inverted are swapped.
    pub fn resolve(self) -> DateRange {
        let (start, end) = match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
            (Some(lo), Some(hi)) => (hi, lo),
            (Some(lo), None) => {
                let end = if lo <= Self::DEFAULT_END {
                    Self::DEFAULT_END
                } else {
                    year_end(lo.year())
                };
                (lo, end)
            }
            (None, Some(hi)) => {
                let start = if hi >= Self::DEFAULT_START {
                    Self::DEFAULT_START
                } else {
                    year_start(hi.year())
                };
                (start, hi)
            }
            (None, None) => (Self::DEFAULT_START, Self::DEFAULT_END),
        };
        DateRange { start, end }
    }
}

fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}
