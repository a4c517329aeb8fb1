use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    /// True for errors that stem from caller-supplied configuration
    /// (unknown datasets, malformed partition inputs).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::UnknownDataset(_) | Error::InvalidRange { .. }
        )
    }
}
