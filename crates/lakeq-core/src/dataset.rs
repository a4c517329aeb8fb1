//! Dataset descriptors: where a dataset lives and how it is partitioned.
//!
//! Descriptors are immutable. A descriptor bound to a table or event type is a
//! new value produced by [`DatasetDescriptor::with_table`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// How a dataset's objects are laid out under its storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    /// One fixed object.
    None,
    /// One object per calendar year.
    ByYear,
    /// Hive-style `year=/month=/day=` directories.
    ByDay,
    /// Table name substituted into a fixed template ending in a glob.
    Wildcard,
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartitionScheme::None => "none",
            PartitionScheme::ByYear => "by_year",
            PartitionScheme::ByDay => "by_day",
            PartitionScheme::Wildcard => "wildcard",
        };
        f.write_str(s)
    }
}

/// Template tokens understood by the path resolver.
pub mod tokens {
    pub const LOCATION: &str = "{location}";
    pub const DATASET: &str = "{dataset}";
    pub const TABLE: &str = "{table}";
    pub const YEAR: &str = "{year}";
    pub const MONTH: &str = "{month}";
    pub const DAY: &str = "{day}";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    id: String,
    storage_location: String,
    scheme: PartitionScheme,
    path_template: String,
    table: Option<String>,
}

impl DatasetDescriptor {
    pub fn new(
        id: impl Into<String>,
        storage_location: impl Into<String>,
        scheme: PartitionScheme,
        path_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            storage_location: storage_location.into().trim_end_matches('/').to_string(),
            scheme,
            path_template: path_template.into(),
            table: None,
        }
    }

    /// Bind the descriptor to a table (or event type) name.
    pub fn with_table(&self, table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn storage_location(&self) -> &str {
        &self.storage_location
    }

    pub fn scheme(&self) -> PartitionScheme {
        self.scheme
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Table bound to this descriptor, falling back to the dataset id.
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.id)
    }

    /// Logical view name queries reference for this dataset.
    pub fn view_name(&self) -> &str {
        self.table()
    }

    /// Template with the date-independent tokens substituted.
    pub fn base_template(&self) -> String {
        self.path_template
            .replace(tokens::LOCATION, &self.storage_location)
            .replace(tokens::DATASET, &self.id)
            .replace(tokens::TABLE, self.table())
    }
}

pub const TUTOR_ACTIVITY: &str = "tutor_activity";
pub const EXERCISES: &str = "exercises";
pub const NOTES_HIGHLIGHTS: &str = "notes_highlights";
pub const EVENT_CAPTURE: &str = "event_capture";

/// Known datasets keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCatalog {
    datasets: Vec<DatasetDescriptor>,
}

impl DatasetCatalog {
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Self {
        Self { datasets }
    }

    /// The standard layout rooted at `data_root` (e.g. `s3://bucket`).
    pub fn standard(data_root: &str) -> Self {
        let root = data_root.trim_end_matches('/');
        Self::new(vec![
            DatasetDescriptor::new(
                TUTOR_ACTIVITY,
                format!("{root}/tutor-activity"),
                PartitionScheme::ByYear,
                "{location}/{dataset}_{year}-01-01__{year}-12-31.parquet",
            ),
            DatasetDescriptor::new(
                EXERCISES,
                format!("{root}/exercises"),
                PartitionScheme::None,
                "{location}/{dataset}.parquet",
            ),
            DatasetDescriptor::new(
                NOTES_HIGHLIGHTS,
                format!("{root}/notes-highlights"),
                PartitionScheme::Wildcard,
                "{location}/{table}/*.parquet",
            )
            .with_table("highlights"),
            DatasetDescriptor::new(
                EVENT_CAPTURE,
                format!("{root}/event-capture"),
                PartitionScheme::ByDay,
                "{location}/{table}/year={year}/month={month}/day={day}/*",
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Result<&DatasetDescriptor> {
        self.datasets
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::UnknownDataset(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dataset_is_configuration_error() {
        let catalog = DatasetCatalog::standard("s3://bucket");
        let err = catalog.get("grades").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("grades"));
    }

    #[test]
    fn table_binding_substitutes_template() {
        let catalog = DatasetCatalog::standard("s3://bucket/");
        let events = catalog.get(EVENT_CAPTURE).unwrap().with_table("page_view");
        assert_eq!(events.view_name(), "page_view");
        assert_eq!(
            events.base_template(),
            "s3://bucket/event-capture/page_view/year={year}/month={month}/day={day}/*"
        );

        let notes = catalog.get(NOTES_HIGHLIGHTS).unwrap();
        assert_eq!(notes.table(), "highlights");
        assert_eq!(notes.with_table("notes").table(), "notes");
    }
}
