//! Local result files.

pub mod csv;
pub mod jsonl;

use chrono::{DateTime, Days, NaiveDate};
use lakeq_core::types::Scalar;

pub use self::csv::CsvWriter;
pub use self::jsonl::JsonlWriter;

/// Output format for a persisted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{other}' (expected jsonl or csv)")),
        }
    }
}

/// `YYYY-MM-DD` for a day count since the epoch.
pub(crate) fn format_date32(days: i32) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs() as u64))
    }?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// RFC 3339 UTC for epoch microseconds.
pub(crate) fn format_timestamp_micros(micros: i64) -> Option<String> {
    DateTime::from_timestamp_micros(micros).map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
}

/// Plain-text rendering shared by the CSV writer.
pub(crate) fn scalar_text(v: &Scalar) -> String {
    match v {
        Scalar::Null => String::new(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::I32(i) => i.to_string(),
        Scalar::I64(i) => i.to_string(),
        Scalar::F32(f) => f.to_string(),
        Scalar::F64(f) => f.to_string(),
        Scalar::Str(s) => s.clone(),
        Scalar::Bin(b) => format!("[binary {} bytes]", b.len()),
        Scalar::Date32(d) => format_date32(*d).unwrap_or_else(|| d.to_string()),
        Scalar::TimestampMicros(t) => format_timestamp_micros(*t).unwrap_or_else(|| t.to_string()),
    }
}
