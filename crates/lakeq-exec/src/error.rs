use std::fmt;

use lakeq_io::EngineError;
use serde::Serialize;
use thiserror::Error;

use crate::session::SessionStage;

#[derive(Debug, Error)]
pub enum ExecError {
    /// Unknown dataset, malformed partition inputs, or unusable settings.
    #[error("configuration error: {0}")]
    Configuration(#[from] lakeq_core::Error),

    /// The engine could not be opened, configured, or bound to the paths.
    #[error("session failed while {stage} [{}]: {source}", .paths.join(", "))]
    Session {
        stage: SessionStage,
        paths: Vec<String>,
        #[source]
        source: EngineError,
    },

    /// The submitted SQL failed against the registered view.
    #[error("query against '{table}' failed: {source}")]
    QueryExecution {
        table: String,
        #[source]
        source: EngineError,
    },

    #[error("partition probe failed: {0}")]
    Probe(#[from] lakeq_io::Error),
}

/// Non-fatal conditions reported alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecWarning {
    /// Collection stopped early; the result holds the pages fetched so far.
    MemoryPressureAbort {
        pages: usize,
        rows: usize,
        resident_gb: f64,
        abort_gb: f64,
    },
    /// None of the resolved partitions exist; no session was opened.
    NoPartitions { dataset: String, checked: usize },
    /// Paths were resolved but the dataset has no execution path yet.
    ExecutionNotImplemented { dataset: String },
}

impl fmt::Display for ExecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecWarning::MemoryPressureAbort {
                pages,
                rows,
                resident_gb,
                abort_gb,
            } => write!(
                f,
                "memory pressure: resident {resident_gb} GB exceeds {abort_gb} GB; \
                 returning {rows} rows from {pages} pages"
            ),
            ExecWarning::NoPartitions { dataset, checked } => write!(
                f,
                "no partitions of '{dataset}' exist for the requested range ({checked} checked)"
            ),
            ExecWarning::ExecutionNotImplemented { dataset } => {
                write!(f, "query execution for '{dataset}' is not implemented")
            }
        }
    }
}
