//! Partition path resolution. Pure: no listing, no network.

use chrono::{Datelike, NaiveDate};

use lakeq_core::dataset::{tokens, DatasetDescriptor, PartitionScheme};
use lakeq_core::date::DateRange;
use lakeq_core::error::{Error, Result};

/// Remote path patterns covering `range` for `descriptor`, in ascending
/// partition order.
///
/// Year partitions are a superset of the range; the query's own predicates
/// narrow rows further.
pub fn resolve_paths(
    descriptor: &DatasetDescriptor,
    range: Option<&DateRange>,
) -> Result<Vec<String>> {
    let base = descriptor.base_template();
    match descriptor.scheme() {
        PartitionScheme::None | PartitionScheme::Wildcard => Ok(vec![base]),
        PartitionScheme::ByYear => {
            let range = require_range(descriptor, range)?;
            Ok(range
                .years()
                .map(|year| base.replace(tokens::YEAR, &format!("{year:04}")))
                .collect())
        }
        PartitionScheme::ByDay => {
            let range = require_range(descriptor, range)?;
            Ok(range.days().map(|day| day_path(&base, day)).collect())
        }
    }
}

fn require_range<'a>(
    descriptor: &DatasetDescriptor,
    range: Option<&'a DateRange>,
) -> Result<&'a DateRange> {
    range.ok_or_else(|| {
        Error::Config(format!(
            "dataset '{}' is partitioned {} and needs a date range",
            descriptor.id(),
            descriptor.scheme()
        ))
    })
}

fn day_path(base: &str, day: NaiveDate) -> String {
    base.replace(tokens::YEAR, &format!("{:04}", day.year()))
        .replace(tokens::MONTH, &format!("{:02}", day.month()))
        .replace(tokens::DAY, &format!("{:02}", day.day()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeq_core::dataset::{DatasetCatalog, EVENT_CAPTURE, EXERCISES, NOTES_HIGHLIGHTS, TUTOR_ACTIVITY};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn catalog() -> DatasetCatalog {
        DatasetCatalog::standard("s3://bucket")
    }

    #[test]
    fn by_year_spans_partial_years() {
        let catalog = catalog();
        let tutor = catalog.get(TUTOR_ACTIVITY).unwrap();
        let range = DateRange::new(d(2022, 11, 15), d(2024, 2, 1)).unwrap();
        let paths = resolve_paths(tutor, Some(&range)).unwrap();
        assert_eq!(
            paths,
            vec![
                "s3://bucket/tutor-activity/tutor_activity_2022-01-01__2022-12-31.parquet",
                "s3://bucket/tutor-activity/tutor_activity_2023-01-01__2023-12-31.parquet",
                "s3://bucket/tutor-activity/tutor_activity_2024-01-01__2024-12-31.parquet",
            ]
        );
    }

    #[test]
    fn by_day_emits_hive_segments() {
        let catalog = catalog();
        let events = catalog.get(EVENT_CAPTURE).unwrap().with_table("page_view");
        let range = DateRange::new(d(2024, 12, 31), d(2025, 1, 1)).unwrap();
        let paths = resolve_paths(&events, Some(&range)).unwrap();
        assert_eq!(
            paths,
            vec![
                "s3://bucket/event-capture/page_view/year=2024/month=12/day=31/*",
                "s3://bucket/event-capture/page_view/year=2025/month=01/day=01/*",
            ]
        );
    }

    #[test]
    fn unpartitioned_and_wildcard_ignore_range() {
        let catalog = catalog();
        let range = DateRange::new(d(2020, 1, 1), d(2024, 1, 1)).unwrap();
        let exercises = catalog.get(EXERCISES).unwrap();
        assert_eq!(
            resolve_paths(exercises, Some(&range)).unwrap(),
            vec!["s3://bucket/exercises/exercises.parquet"]
        );
        assert_eq!(resolve_paths(exercises, None).unwrap().len(), 1);

        let notes = catalog.get(NOTES_HIGHLIGHTS).unwrap().with_table("notes");
        assert_eq!(
            resolve_paths(&notes, None).unwrap(),
            vec!["s3://bucket/notes-highlights/notes/*.parquet"]
        );
    }

    #[test]
    fn dated_scheme_without_range_is_configuration_error() {
        let catalog = catalog();
        let err = resolve_paths(catalog.get(TUTOR_ACTIVITY).unwrap(), None).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("by_year"));
    }
}
